//! Per-pair run lock.
//!
//! Two runs against the same pair would interleave their snapshot
//! read-modify-write, so each run holds an exclusive advisory lock on
//! `<home>/.pairsync/locks/<pair_id>.lock` for its whole duration.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use pairsync_core::{paths, PairId};

use crate::error::{io_err, SyncError};

/// Held for the duration of a run; released on drop.
#[derive(Debug)]
pub struct PairLock {
    file: File,
    path: PathBuf,
}

impl PairLock {
    /// Take the lock without waiting. A lock held elsewhere is
    /// [`SyncError::PairBusy`].
    pub fn acquire_at(home: &Path, pair: &PairId) -> Result<Self, SyncError> {
        let dir = paths::locks_dir(home);
        paths::ensure_private_dir(&dir)?;
        let path = paths::lock_path(home, pair);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(SyncError::PairBusy {
                pair: pair.clone(),
                path,
            });
        }
        tracing::debug!("locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PairLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!("could not release {}: {err}", self.path.display());
        }
    }
}
