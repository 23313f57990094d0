//! Error types for pairsync-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use pairsync_core::{PairId, Side, StoreError};

use crate::plan::PlanAction;

/// Reasons the engine refuses to produce a plan. Any conflict makes every
/// decision of the run untrustworthy, so nothing is executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    /// The same relative path is a file on one side and a directory on the other.
    #[error("'{path}' is a file in {file_side} but a directory in {}", file_side.other())]
    TypeMismatch { path: String, file_side: Side },

    /// A path was classified into two decision sets.
    #[error("'{path}' was classified as both {first} and {second}")]
    DuplicateDecision {
        path: String,
        first: PlanAction,
        second: PlanAction,
    },
}

/// All conflicts found in one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflicts(pub Vec<Conflict>);

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict(s)", self.0.len())?;
        for conflict in &self.0 {
            write!(f, "\n  - {conflict}")?;
        }
        Ok(())
    }
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the on-disk stores.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tree root that does not exist or is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Bad arguments: identical roots, nested roots.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The pair exists but its snapshot can no longer be trusted.
    #[error("pair {pair} must be re-initialised before it can be synced")]
    NeedsReinit { pair: PairId },

    /// Conflicts detected by the engine; the run was stopped before any change.
    #[error("reconciliation stopped: {0}")]
    Conflict(Conflicts),

    /// Another run holds the lock for this pair.
    #[error("another run is in progress for pair {pair} (lock: {path})")]
    PairBusy { pair: PairId, path: PathBuf },

    /// The mirror tool could not be started at all.
    #[error("failed to run mirror tool {program}: {source}")]
    MirrorSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// True for the conditions that send the caller to first-time setup.
    pub fn requires_setup(&self) -> bool {
        match self {
            SyncError::Store(err) => err.requires_setup(),
            SyncError::NeedsReinit { .. } => true,
            _ => false,
        }
    }

    /// True for bad caller input (paths, identical roots).
    pub fn is_input_error(&self) -> bool {
        matches!(self, SyncError::NotADirectory { .. } | SyncError::InvalidInput(_))
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
