//! # pairsync-sync
//!
//! Two-way reconciliation of a folder pair.
//!
//! [`scan::scan`] lists each tree, [`reconcile::reconcile`] compares both
//! listings with the pair's snapshot and produces a [`ReconciliationPlan`],
//! and [`execute::execute`] deletes locally and hands copies to a [`Mirror`].
//! The [`pipeline`] module strings these together for a registered pair.

pub mod error;
pub mod exclude;
pub mod execute;
pub mod lock;
pub mod mirror;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod scan;

pub use error::{Conflict, Conflicts, SyncError};
pub use exclude::ExclusionSet;
pub use execute::{ExecuteOptions, ExecutionReport, SetStatus};
pub use mirror::{Mirror, MirrorOutcome, MirrorRequest, RsyncMirror};
pub use pipeline::{init_pair_at, prepare_at, sync_at, PreparedSync, SnapshotStatus, SyncOutcome};
pub use plan::{EntryKind, PlanAction, ReconciliationPlan};
pub use reconcile::{reconcile, Reconciliation};
pub use scan::{scan, ScanReport};
