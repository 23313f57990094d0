//! Plan executor.
//!
//! Deletions are performed here, on both sides, before anything is copied:
//! files first, then directories deepest-first with a non-recursive
//! `remove_dir` so a directory that still holds anything stays in place.
//! Additions and updates are handed to a [`Mirror`], one list per direction.
//!
//! Nothing in here fails the run. Every outcome lands in the
//! [`ExecutionReport`], which then decides what the next snapshot records.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use pairsync_core::tree::{self, Snapshot};
use pairsync_core::Side;

use crate::mirror::{is_listable, Mirror, MirrorOutcome, MirrorRequest};
use crate::plan::{EntryKind, PlanAction, ReconciliationPlan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub delete_enabled: bool,
    pub dry_run: bool,
}

/// What happened to one decision set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    /// Nothing was planned.
    Empty,
    Applied,
    /// Some entries failed and were withheld from the snapshot.
    Partial,
    /// Deletions were turned off for this run; nothing was removed.
    SkippedDeletionsDisabled,
    /// Reported only.
    DryRun,
    /// The mirror tool failed for this direction.
    Failed,
}

impl SetStatus {
    pub fn label(self) -> &'static str {
        match self {
            SetStatus::Empty => "nothing to do",
            SetStatus::Applied => "done",
            SetStatus::Partial => "partially done",
            SetStatus::SkippedDeletionsDisabled => "skipped (deletions disabled)",
            SetStatus::DryRun => "dry run",
            SetStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub side: Side,
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub side: Side,
    pub path: String,
    pub kind: EntryKind,
    pub reason: String,
}

/// A planned copy that could not be handed to the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unlisted {
    pub from: Side,
    pub path: String,
}

/// One mirror invocation and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub from: Side,
    pub listed: usize,
    pub outcome: MirrorOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub statuses: BTreeMap<PlanAction, SetStatus>,
    /// Confirmed deletions.
    pub deleted: Vec<Deletion>,
    pub delete_failures: Vec<DeleteFailure>,
    pub transfers: Vec<Transfer>,
    /// Copies withheld because their names contain a line break.
    pub unlisted: Vec<Unlisted>,
    /// Additions whose direction's mirror run succeeded.
    committed: Vec<(String, EntryKind)>,
}

impl ExecutionReport {
    pub fn status(&self, action: PlanAction) -> SetStatus {
        self.statuses.get(&action).copied().unwrap_or(SetStatus::Empty)
    }

    /// Additions that will be recorded in the snapshot.
    pub fn committed(&self) -> impl Iterator<Item = (&str, EntryKind)> {
        self.committed.iter().map(|(path, kind)| (path.as_str(), *kind))
    }

    /// True when a deletion or a mirror run failed.
    pub fn has_failures(&self) -> bool {
        self.statuses
            .values()
            .any(|status| matches!(status, SetStatus::Partial | SetStatus::Failed))
    }

    /// Fold the outcome into the engine's base snapshot: confirmed deletions
    /// are forgotten, committed additions recorded.
    pub fn apply_to(&self, snapshot: &mut Snapshot) {
        for deletion in &self.deleted {
            match deletion.kind {
                EntryKind::File => {
                    let (dir, name) = tree::split(&deletion.path);
                    snapshot.remove_file(dir, name);
                }
                EntryKind::Dir => {
                    snapshot.remove_dir(&deletion.path);
                }
            }
        }
        for (path, kind) in &self.committed {
            match kind {
                EntryKind::Dir => snapshot.insert_dir(path.as_str()),
                EntryKind::File => {
                    let (dir, name) = tree::split(path);
                    snapshot.insert_file(dir, name);
                }
            }
        }
    }
}

/// Carry out `plan` between the two roots.
pub fn execute(
    plan: &ReconciliationPlan,
    source_root: &Path,
    target_root: &Path,
    options: ExecuteOptions,
    mirror: &dyn Mirror,
) -> ExecutionReport {
    let mut run = Run {
        report: ExecutionReport {
            statuses: BTreeMap::new(),
            deleted: Vec::new(),
            delete_failures: Vec::new(),
            transfers: Vec::new(),
            unlisted: Vec::new(),
            committed: Vec::new(),
        },
        options,
    };

    run.delete(plan, Side::Source, source_root);
    run.delete(plan, Side::Target, target_root);
    run.transfer(plan, Side::Source, source_root, target_root, mirror);
    run.transfer(plan, Side::Target, target_root, source_root, mirror);
    run.report
}

struct Run {
    report: ExecutionReport,
    options: ExecuteOptions,
}

impl Run {
    fn set_status(&mut self, action: PlanAction, status: SetStatus) {
        self.report.statuses.insert(action, status);
    }

    fn delete(&mut self, plan: &ReconciliationPlan, side: Side, root: &Path) {
        let action = PlanAction::delete_from(side);
        let items: Vec<(&str, EntryKind)> = plan.items_of(action).collect();
        if items.is_empty() {
            self.set_status(action, SetStatus::Empty);
            return;
        }
        if !self.options.delete_enabled {
            tracing::info!(
                "skipping {} deletion(s) from {side}: deletions disabled",
                items.len()
            );
            self.set_status(action, SetStatus::SkippedDeletionsDisabled);
            return;
        }
        if self.options.dry_run {
            for (path, _) in &items {
                tracing::info!("[dry-run] would delete from {side}: {path}");
            }
            self.set_status(action, SetStatus::DryRun);
            return;
        }

        let mut dirs: Vec<&str> = Vec::new();
        let mut failed = false;
        for (path, kind) in &items {
            if *kind == EntryKind::Dir {
                dirs.push(*path);
                continue;
            }
            failed |= !self.remove(side, root, path, EntryKind::File);
        }

        dirs.sort_by(|a, b| tree::depth(b).cmp(&tree::depth(a)).then_with(|| b.cmp(a)));
        for dir in dirs {
            failed |= !self.remove(side, root, dir, EntryKind::Dir);
        }

        let status = if failed {
            SetStatus::Partial
        } else {
            SetStatus::Applied
        };
        self.set_status(action, status);
    }

    fn remove(&mut self, side: Side, root: &Path, path: &str, kind: EntryKind) -> bool {
        let abs = tree::absolute(root, path);
        let result = match kind {
            EntryKind::File => std::fs::remove_file(&abs),
            EntryKind::Dir => std::fs::remove_dir(&abs),
        };
        match result {
            Ok(()) => {
                tracing::info!("deleted from {side}: {path}");
                self.report.deleted.push(Deletion {
                    side,
                    path: path.to_string(),
                    kind,
                });
                true
            }
            Err(err) => {
                tracing::warn!("could not delete {} from {side}: {err}", abs.display());
                self.report.delete_failures.push(DeleteFailure {
                    side,
                    path: path.to_string(),
                    kind,
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    fn transfer(
        &mut self,
        plan: &ReconciliationPlan,
        from: Side,
        from_root: &Path,
        to_root: &Path,
        mirror: &dyn Mirror,
    ) {
        let update = PlanAction::update_from(from);
        let add = PlanAction::add_from(from);
        let mut planned: Vec<String> = plan.paths(update).map(str::to_string).collect();
        let additions: Vec<(String, EntryKind)> = plan
            .items_of(add)
            .map(|(path, kind)| (path.to_string(), kind))
            .collect();
        planned.extend(additions.iter().map(|(path, _)| path.clone()));

        if planned.is_empty() {
            self.set_status(update, SetStatus::Empty);
            self.set_status(add, SetStatus::Empty);
            return;
        }

        let (files, rejected): (Vec<String>, Vec<String>) = planned
            .into_iter()
            .partition(|path| is_listable(path));
        for path in &rejected {
            tracing::warn!("not copying {path:?} from {from}: names with line breaks cannot be listed");
        }

        let outcome = if files.is_empty() {
            None
        } else {
            let request = MirrorRequest {
                from: from_root.to_path_buf(),
                to: to_root.to_path_buf(),
                files: Some(files),
                delete: false,
                dry_run: self.options.dry_run,
                exclude: Vec::new(),
            };
            let outcome = mirror.mirror(&request).unwrap_or_else(|err| {
                tracing::warn!("mirror from {from} failed: {err}");
                MirrorOutcome::Failed {
                    code: None,
                    stderr: err.to_string(),
                }
            });
            self.report.transfers.push(Transfer {
                from,
                listed: request.files.as_ref().map_or(0, Vec::len),
                outcome: outcome.clone(),
            });
            Some(outcome)
        };
        let mirrored = outcome.as_ref().map_or(true, MirrorOutcome::is_success);

        for action in [update, add] {
            let status = if plan.count(action) == 0 {
                SetStatus::Empty
            } else if !mirrored {
                SetStatus::Failed
            } else if self.options.dry_run {
                SetStatus::DryRun
            } else if plan.paths(action).any(|path| rejected.iter().any(|r| r == path)) {
                SetStatus::Partial
            } else {
                SetStatus::Applied
            };
            self.set_status(action, status);
        }

        if mirrored && !self.options.dry_run {
            self.report.committed.extend(
                additions
                    .into_iter()
                    .filter(|(path, _)| !rejected.contains(path)),
            );
        }
        self.report
            .unlisted
            .extend(rejected.into_iter().map(|path| Unlisted { from, path }));
    }
}
