//! Snapshot store: last known mutual state of each pair.
//!
//! Persists a [`SnapshotFile`] JSON document at
//! `<home>/.pairsync/snapshots/<pair_id>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the registry.
//!
//! Unlike most stores, a missing file is NOT treated as empty: without the
//! ancestor state a reconciliation cannot tell "new since last sync" from
//! "deleted since last sync", so absence and corruption are reported as
//! distinct errors.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths::{self, home};
use crate::tree::Snapshot;
use crate::types::{FolderPair, PairId};

/// On-disk snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub pair_id: PairId,
    pub source: PathBuf,
    pub target: PathBuf,
    pub synced_at: DateTime<Utc>,
    pub dirs: Snapshot,
}

impl SnapshotFile {
    /// Wrap `dirs` for `pair`, stamped now.
    pub fn for_pair(pair: &FolderPair, dirs: Snapshot) -> Self {
        Self {
            pair_id: pair.id.clone(),
            source: pair.source.clone(),
            target: pair.target.clone(),
            synced_at: Utc::now(),
            dirs,
        }
    }
}

/// Load the snapshot for `pair`.
///
/// - `StoreError::SnapshotNotFound` if it was never written (or was removed)
/// - `StoreError::CorruptSnapshot` if it does not decode
/// - `StoreError::SnapshotMismatch` if it was written for another pair
pub fn load_snapshot_at(home: &Path, pair: &PairId) -> Result<SnapshotFile, StoreError> {
    let path = paths::snapshot_path(home, pair);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StoreError::SnapshotNotFound {
                pair: pair.clone(),
                path,
            });
        }
        Err(err) => return Err(io_err(&path, err)),
    };

    let file: SnapshotFile = serde_json::from_str(&contents)
        .map_err(|source| StoreError::CorruptSnapshot { path: path.clone(), source })?;
    if &file.pair_id != pair {
        return Err(StoreError::SnapshotMismatch {
            path,
            expected: pair.clone(),
            found: file.pair_id,
        });
    }
    Ok(file)
}

/// `load_snapshot_at` convenience wrapper.
pub fn load_snapshot(pair: &PairId) -> Result<SnapshotFile, StoreError> {
    load_snapshot_at(&home()?, pair)
}

/// Save the snapshot atomically.
pub fn save_snapshot_at(home: &Path, snapshot: &SnapshotFile) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    paths::write_atomic(&paths::snapshot_path(home, &snapshot.pair_id), json.as_bytes())
}

/// `save_snapshot_at` convenience wrapper.
pub fn save_snapshot(snapshot: &SnapshotFile) -> Result<(), StoreError> {
    save_snapshot_at(&home()?, snapshot)
}

/// Delete the stored snapshot. Missing is fine.
pub fn remove_snapshot_at(home: &Path, pair: &PairId) -> Result<(), StoreError> {
    let path = paths::snapshot_path(home, pair);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair() -> FolderPair {
        FolderPair::new(PathBuf::from("/data/a"), PathBuf::from("/data/b"))
    }

    #[test]
    fn missing_snapshot_is_not_found_not_empty() {
        let tmp = TempDir::new().unwrap();
        let err = load_snapshot_at(tmp.path(), &pair().id).unwrap_err();
        assert!(matches!(err, StoreError::SnapshotNotFound { .. }), "got: {err}");
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut dirs = Snapshot::new();
        dirs.insert_dir("");
        dirs.insert_file("docs", "a.txt");
        dirs.insert_dir("empty");
        let file = SnapshotFile::for_pair(&pair(), dirs);

        save_snapshot_at(tmp.path(), &file).unwrap();
        let loaded = load_snapshot_at(tmp.path(), &file.pair_id).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let file = SnapshotFile::for_pair(&pair(), Snapshot::new());
        save_snapshot_at(tmp.path(), &file).unwrap();
        let tmp_path = paths::snapshot_path(tmp.path(), &file.pair_id).with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn garbage_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let id = pair().id;
        let path = paths::snapshot_path(tmp.path(), &id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_snapshot_at(tmp.path(), &id).unwrap_err();
        assert!(matches!(err, StoreError::CorruptSnapshot { .. }), "got: {err}");
        assert!(err.requires_setup());
    }

    #[test]
    fn snapshot_of_other_pair_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = SnapshotFile::for_pair(&pair(), Snapshot::new());
        save_snapshot_at(tmp.path(), &file).unwrap();

        let other = PairId::from("ffffffffffffffff");
        std::fs::copy(
            paths::snapshot_path(tmp.path(), &file.pair_id),
            paths::snapshot_path(tmp.path(), &other),
        )
        .unwrap();
        let err = load_snapshot_at(tmp.path(), &other).unwrap_err();
        assert!(matches!(err, StoreError::SnapshotMismatch { .. }), "got: {err}");
    }

    #[test]
    fn remove_missing_snapshot_is_ok() {
        let tmp = TempDir::new().unwrap();
        remove_snapshot_at(tmp.path(), &pair().id).expect("remove");
    }
}
