//! Error types for pairsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PairId;

/// All errors that can arise from the on-disk stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path it happened on.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (write/save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.pairsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No snapshot has been stored for this pair.
    #[error("no snapshot stored for pair {pair} (expected at {path})")]
    SnapshotNotFound { pair: PairId, path: PathBuf },

    /// A snapshot file exists but cannot be decoded.
    #[error("snapshot at {path} is corrupt: {source}")]
    CorruptSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot file belongs to another pair.
    #[error("snapshot at {path} belongs to pair {found}, expected {expected}")]
    SnapshotMismatch {
        path: PathBuf,
        expected: PairId,
        found: PairId,
    },

    /// No registered pair matches the given roots.
    #[error("no folder pair registered for {source_root} <-> {target_root}")]
    PairNotFound {
        source_root: PathBuf,
        target_root: PathBuf,
    },
}

impl StoreError {
    /// True for the conditions that can only be fixed by setting the pair up
    /// again: unknown pair, missing snapshot, corrupt snapshot.
    pub fn requires_setup(&self) -> bool {
        matches!(
            self,
            StoreError::PairNotFound { .. }
                | StoreError::SnapshotNotFound { .. }
                | StoreError::CorruptSnapshot { .. }
                | StoreError::SnapshotMismatch { .. }
        )
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
