//! Shared fixtures for the pairsync-sync integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use pairsync_core::tree::{self, Snapshot};
use pairsync_core::{registry, snapshot_store, FolderPair, SnapshotFile};
use pairsync_sync::mirror::ItemizedChange;
use pairsync_sync::{Mirror, MirrorOutcome, MirrorRequest, SyncError};
use tempfile::TempDir;

pub const T0: i64 = 1_700_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A home directory plus two empty trees.
pub struct Fixture {
    pub home: TempDir,
    pub source: TempDir,
    pub target: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        Self {
            home: TempDir::new().expect("home"),
            source: TempDir::new().expect("source"),
            target: TempDir::new().expect("target"),
        }
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn src(&self) -> &Path {
        self.source.path()
    }

    pub fn tgt(&self) -> &Path {
        self.target.path()
    }

    /// Canonical roots, as the pipeline stores them.
    pub fn roots(&self) -> (PathBuf, PathBuf) {
        (
            self.src().canonicalize().expect("canonical source"),
            self.tgt().canonicalize().expect("canonical target"),
        )
    }

    /// Register the pair with `snapshot` as its last mutual state.
    pub fn register(&self, snapshot: Snapshot) -> FolderPair {
        let (source, target) = self.roots();
        let pair = registry::register_pair_at(self.home(), source, target).expect("register");
        snapshot_store::save_snapshot_at(self.home(), &SnapshotFile::for_pair(&pair, snapshot))
            .expect("save snapshot");
        pair
    }

    pub fn stored_snapshot(&self, pair: &FolderPair) -> Snapshot {
        snapshot_store::load_snapshot_at(self.home(), &pair.id)
            .expect("load snapshot")
            .dirs
    }
}

/// Write `rel` below `root` with content and mtime `T0 + offset`.
pub fn write_file(root: &Path, rel: &str, offset: i64) {
    let path = tree::absolute(root, rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, format!("{rel} @ {offset}")).expect("write");
    filetime::set_file_mtime(&path, FileTime::from_unix_time(T0 + offset, 0)).expect("mtime");
}

pub fn mkdir(root: &Path, rel: &str) {
    fs::create_dir_all(tree::absolute(root, rel)).expect("mkdir");
}

pub fn snapshot(entries: &[(&str, &[&str])]) -> Snapshot {
    entries
        .iter()
        .map(|(dir, names)| (dir.to_string(), names.iter().map(|n| n.to_string()).collect()))
        .collect()
}

/// Copies listed entries and keeps their modification times, like `rsync -a`.
/// A whole-tree request honours the exclude rules and, with `delete`, removes
/// target entries missing from the source.
pub struct CopyMirror;

impl Mirror for CopyMirror {
    fn mirror(&self, request: &MirrorRequest) -> Result<MirrorOutcome, SyncError> {
        if request.dry_run {
            return Ok(MirrorOutcome::AlreadySynced);
        }
        let excluded = |rel: &str, is_dir: bool| request.exclude.iter().any(|r| r.covers(rel, is_dir));
        let files = match &request.files {
            Some(files) => files.clone(),
            None => {
                let wanted: Vec<String> = all_paths(&request.from)
                    .into_iter()
                    .filter(|(rel, is_dir)| !excluded(rel, *is_dir))
                    .map(|(rel, _)| rel)
                    .collect();
                if request.delete {
                    for (rel, is_dir) in all_paths(&request.to) {
                        if excluded(&rel, is_dir) || wanted.contains(&rel) {
                            continue;
                        }
                        let path = tree::absolute(&request.to, &rel);
                        // Directories come after their contents; one still holding
                        // an excluded entry stays.
                        let _ = if is_dir {
                            fs::remove_dir(&path)
                        } else {
                            fs::remove_file(&path)
                        };
                    }
                }
                wanted
            }
        };
        let mut changes = Vec::new();
        for rel in files {
            let from = tree::absolute(&request.from, &rel);
            let to = tree::absolute(&request.to, &rel);
            let meta = fs::symlink_metadata(&from).expect("stat listed path");
            if meta.is_dir() {
                fs::create_dir_all(&to).expect("mkdir");
            } else {
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent).expect("mkdir parent");
                }
                fs::copy(&from, &to).expect("copy");
                filetime::set_file_mtime(&to, FileTime::from_last_modification_time(&meta))
                    .expect("keep mtime");
            }
            changes.push(ItemizedChange {
                change: pairsync_sync::mirror::ChangeKind::Created,
                file_type: pairsync_sync::mirror::ItemType::File,
                path: rel,
            });
        }
        if changes.is_empty() {
            Ok(MirrorOutcome::AlreadySynced)
        } else {
            Ok(MirrorOutcome::Transferred { changes })
        }
    }
}

/// Always fails, like an rsync that exits non-zero.
pub struct BrokenMirror;

impl Mirror for BrokenMirror {
    fn mirror(&self, _request: &MirrorRequest) -> Result<MirrorOutcome, SyncError> {
        Ok(MirrorOutcome::Failed {
            code: Some(12),
            stderr: "protocol data stream error".to_string(),
        })
    }
}

/// Every entry below `root` with whether it is a directory, contents first.
fn all_paths(root: &Path) -> Vec<(String, bool)> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.expect("walk"))
        .filter_map(|entry| {
            let is_dir = entry.file_type().is_dir();
            tree::relative(root, entry.path()).map(|rel| (rel, is_dir))
        })
        .collect()
}
