//! pairsync core library: data model, on-disk stores, errors.
//!
//! Public API surface:
//! - [`types`]: pair identifiers and registry structs
//! - [`tree`]: [`DirectoryTree`] and [`Snapshot`], relative path helpers
//! - [`error`]: [`StoreError`]
//! - [`registry`]: folder-pair registry load / save / lookup
//! - [`snapshot_store`]: per-pair snapshot persistence
//! - [`excludes`]: exclusion pattern lists
//! - [`settings`]: `config.yaml`
//! - [`paths`]: `~/.pairsync/` layout and atomic writes

pub mod error;
pub mod excludes;
pub mod paths;
pub mod registry;
pub mod settings;
pub mod snapshot_store;
pub mod tree;
pub mod types;

pub use error::StoreError;
pub use settings::{MirrorSettings, Settings};
pub use snapshot_store::SnapshotFile;
pub use tree::{DirectoryTree, EntrySet, Snapshot};
pub use types::{FolderPair, PairId, PairRegistry, Side};
