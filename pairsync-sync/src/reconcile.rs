//! Reconciliation engine.
//!
//! Three-way comparison of the current source tree, the current target tree
//! and the snapshot of their last mutual state. Directories are partitioned
//! up front into mutual, source-only and target-only sets; each partition is
//! then walked on its own:
//!
//! - a file on both sides is updated from the side with the strictly newer
//!   modification time (equal times are left alone);
//! - an item on one side only is a deletion to propagate when the snapshot
//!   knew it (the other side deleted it), an addition otherwise;
//! - a directory on one side only decides for its key and the files directly
//!   inside it. Deeper directory keys are decided on their own.
//!
//! The engine only reads: modification times come from `symlink_metadata`,
//! so links are compared by their own timestamp.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::SystemTime;

use pairsync_core::tree::{self, DirectoryTree, EntrySet, Snapshot};
use pairsync_core::Side;

use crate::error::{io_err, Conflict, Conflicts, SyncError};
use crate::plan::{EntryKind, PlanAction, ReconciliationPlan};

/// Plan for one run plus the snapshot to persist once it has been executed.
///
/// `snapshot` is the base for the next snapshot: mutual directories with
/// their mutual files, plus every item planned for deletion. The executor's
/// report drops confirmed deletions from it and adds committed additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub plan: ReconciliationPlan,
    pub snapshot: Snapshot,
}

/// Compare two scanned trees against the last mutual snapshot.
///
/// Fails with [`SyncError::Conflict`] listing every conflict found; a stat
/// failure on a mutual file is an [`SyncError::Io`].
pub fn reconcile(
    source: &DirectoryTree,
    target: &DirectoryTree,
    snapshot: &Snapshot,
    source_root: &Path,
    target_root: &Path,
) -> Result<Reconciliation, SyncError> {
    let source_dirs: BTreeSet<&str> = source.dirs().collect();
    let target_dirs: BTreeSet<&str> = target.dirs().collect();
    let mutual: Vec<&str> = source_dirs.intersection(&target_dirs).copied().collect();
    let source_only: Vec<&str> = source_dirs.difference(&target_dirs).copied().collect();
    let target_only: Vec<&str> = target_dirs.difference(&source_dirs).copied().collect();

    let mut builder = Builder::default();
    let mismatched = builder.type_mismatches(source, target, &mutual);

    let roots = Roots {
        source: source_root,
        target: target_root,
    };
    for dir in &mutual {
        let (Some(source_files), Some(target_files)) = (source.entries(dir), target.entries(dir))
        else {
            continue;
        };
        builder.mutual_dir(dir, source_files, target_files, snapshot, &mismatched, &roots)?;
    }

    for (side, dirs, listing) in [
        (Side::Source, &source_only, source),
        (Side::Target, &target_only, target),
    ] {
        for dir in dirs {
            if mismatched.contains(*dir) {
                continue;
            }
            let empty = EntrySet::new();
            let files = listing.entries(dir).unwrap_or(&empty);
            builder.exclusive_dir(side, dir, files, snapshot);
        }
    }

    builder.finish()
}

struct Roots<'a> {
    source: &'a Path,
    target: &'a Path,
}

#[derive(Default)]
struct Builder {
    plan: ReconciliationPlan,
    next: Snapshot,
    conflicts: Vec<Conflict>,
}

impl Builder {
    fn decide(&mut self, path: String, action: PlanAction, kind: EntryKind) {
        if let Err(conflict) = self.plan.insert(path, action, kind) {
            self.conflicts.push(conflict);
        }
    }

    /// Entry names in a mutual directory that are directory keys on the
    /// other side. Returns the offending paths so neither view is planned.
    fn type_mismatches(
        &mut self,
        source: &DirectoryTree,
        target: &DirectoryTree,
        mutual: &[&str],
    ) -> BTreeSet<String> {
        let mut mismatched = BTreeSet::new();
        for dir in mutual {
            for (file_side, files_tree, dirs_tree) in [
                (Side::Source, source, target),
                (Side::Target, target, source),
            ] {
                let Some(names) = files_tree.entries(dir) else {
                    continue;
                };
                for name in names {
                    let path = tree::join(dir, name);
                    if dirs_tree.contains_dir(&path) {
                        self.conflicts.push(Conflict::TypeMismatch {
                            path: path.clone(),
                            file_side,
                        });
                        mismatched.insert(path);
                    }
                }
            }
        }
        mismatched
    }

    fn mutual_dir(
        &mut self,
        dir: &str,
        source_files: &EntrySet,
        target_files: &EntrySet,
        snapshot: &Snapshot,
        mismatched: &BTreeSet<String>,
        roots: &Roots<'_>,
    ) -> Result<(), SyncError> {
        self.next.insert_dir(dir);

        for name in source_files.intersection(target_files) {
            self.next.insert_file(dir, name.clone());
            let path = tree::join(dir, name);
            let source_time = modified(roots.source, &path)?;
            let target_time = modified(roots.target, &path)?;
            match source_time.cmp(&target_time) {
                Ordering::Greater => {
                    self.decide(path, PlanAction::update_from(Side::Source), EntryKind::File)
                }
                Ordering::Less => {
                    self.decide(path, PlanAction::update_from(Side::Target), EntryKind::File)
                }
                Ordering::Equal => {}
            }
        }

        for (side, own, other) in [
            (Side::Source, source_files, target_files),
            (Side::Target, target_files, source_files),
        ] {
            for name in own.difference(other) {
                let path = tree::join(dir, name);
                if mismatched.contains(&path) {
                    continue;
                }
                if snapshot.contains_file(dir, name) {
                    self.next.insert_file(dir, name.clone());
                    self.decide(path, PlanAction::delete_from(side), EntryKind::File);
                } else {
                    self.decide(path, PlanAction::add_from(side), EntryKind::File);
                }
            }
        }
        Ok(())
    }

    fn exclusive_dir(&mut self, side: Side, dir: &str, files: &EntrySet, snapshot: &Snapshot) {
        let action = if snapshot.contains_dir(dir) {
            self.next.insert_dir(dir);
            for name in files {
                self.next.insert_file(dir, name.clone());
            }
            PlanAction::delete_from(side)
        } else {
            PlanAction::add_from(side)
        };

        self.decide(dir.to_string(), action, EntryKind::Dir);
        for name in files {
            self.decide(tree::join(dir, name), action, EntryKind::File);
        }
    }

    fn finish(self) -> Result<Reconciliation, SyncError> {
        if !self.conflicts.is_empty() {
            return Err(SyncError::Conflict(Conflicts(self.conflicts)));
        }
        Ok(Reconciliation {
            plan: self.plan,
            snapshot: self.next,
        })
    }
}

fn modified(root: &Path, rel: &str) -> Result<SystemTime, SyncError> {
    let path = tree::absolute(root, rel);
    std::fs::symlink_metadata(&path)
        .and_then(|meta| meta.modified())
        .map_err(|e| io_err(&path, e))
}
