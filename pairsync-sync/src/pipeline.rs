//! Sync pipeline entry points used by the CLI.
//!
//! A run is split in two so the caller can show the plan and ask before
//! anything changes:
//!
//! 1. [`prepare_at`]: validate roots, take the pair lock, look up the pair
//!    and its snapshot, scan both trees in parallel and reconcile.
//! 2. [`PreparedSync::execute`]: run the plan and persist the new snapshot.
//!
//! [`init_pair_at`] is the first-time setup for a pair that has no snapshot.

use std::path::{Path, PathBuf};

use pairsync_core::tree::Snapshot;
use pairsync_core::{
    excludes, registry, snapshot_store, DirectoryTree, FolderPair, PairId, Side, SnapshotFile,
    StoreError,
};

use crate::error::{io_err, SyncError};
use crate::exclude::ExclusionSet;
use crate::execute::{self, ExecuteOptions, ExecutionReport};
use crate::lock::PairLock;
use crate::mirror::{Mirror, MirrorExclude, MirrorOutcome, MirrorRequest};
use crate::plan::ReconciliationPlan;
use crate::reconcile;
use crate::scan::{self, ScanReport};

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Canonicalize both roots and check they can form a pair: both existing
/// directories, distinct, and neither inside the other.
pub fn validate_roots(source: &Path, target: &Path) -> Result<(PathBuf, PathBuf), SyncError> {
    let source = canonical_dir(source)?;
    let target = canonical_dir(target)?;
    if source == target {
        return Err(SyncError::InvalidInput(format!(
            "source and target are the same directory: {}",
            source.display()
        )));
    }
    if source.starts_with(&target) || target.starts_with(&source) {
        return Err(SyncError::InvalidInput(format!(
            "{} and {} are nested inside each other",
            source.display(),
            target.display()
        )));
    }
    Ok((source, target))
}

fn canonical_dir(path: &Path) -> Result<PathBuf, SyncError> {
    let canonical = match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::NotADirectory {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(path, err)),
    };
    if !canonical.is_dir() {
        return Err(SyncError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(canonical)
}

// ---------------------------------------------------------------------------
// Two-way sync
// ---------------------------------------------------------------------------

/// A reconciled pair, locked and ready to execute.
#[derive(Debug)]
pub struct PreparedSync {
    pub pair: FolderPair,
    pub source: PathBuf,
    pub target: PathBuf,
    pub plan: ReconciliationPlan,
    /// Subtrees that could not be read on either side, left untouched.
    pub skipped: Vec<(Side, String)>,
    base: Snapshot,
    home: PathBuf,
    _lock: PairLock,
}

/// Whether the new snapshot reached disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    Saved,
    /// Dry run.
    NotWritten,
    /// The write failed and the pair is flagged for re-initialisation.
    Failed { reason: String },
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub pair: FolderPair,
    pub plan: ReconciliationPlan,
    pub report: ExecutionReport,
    pub snapshot: SnapshotStatus,
    pub skipped: Vec<(Side, String)>,
}

/// Reconcile a registered pair without changing anything on disk.
///
/// Unknown pairs, pairs flagged for re-initialisation and pairs whose
/// snapshot is missing or corrupt fail with an error for which
/// [`SyncError::requires_setup`] is true.
pub fn prepare_at(home: &Path, source: &Path, target: &Path) -> Result<PreparedSync, SyncError> {
    let (source, target) = validate_roots(source, target)?;
    // Everything read from the state directory is read under the lock.
    let lock = PairLock::acquire_at(home, &PairId::derive(&source, &target))?;
    let pair = registry::find_pair_at(home, &source, &target)?;
    if pair.needs_reinit {
        return Err(SyncError::NeedsReinit { pair: pair.id });
    }
    let stored = snapshot_store::load_snapshot_at(home, &pair.id)?;

    let (source_excl, target_excl) =
        load_exclusions(home, &pair.id, pair.source != source, &source, &target)?;
    let (source_scan, target_scan) = scan_both(&source, &source_excl, &target, &target_excl)?;
    let (mut source_tree, mut target_tree, skipped) = drop_skipped(source_scan, target_scan);
    exclude_from_both(&source_excl, &target_excl, &mut source_tree, &mut target_tree);

    let result = reconcile::reconcile(&source_tree, &target_tree, &stored.dirs, &source, &target)?;
    let mut base = result.snapshot;
    for (_, rel) in &skipped {
        carry_forward(&stored.dirs, &mut base, rel);
    }
    tracing::info!(
        pair = %pair.id,
        decisions = result.plan.len(),
        skipped = skipped.len(),
        "reconciled"
    );

    Ok(PreparedSync {
        pair,
        source,
        target,
        plan: result.plan,
        skipped,
        base,
        home: home.to_path_buf(),
        _lock: lock,
    })
}

impl PreparedSync {
    /// Execute the plan and, unless this is a dry run, persist the snapshot.
    pub fn execute(self, mirror: &dyn Mirror, options: ExecuteOptions) -> SyncOutcome {
        let report = execute::execute(&self.plan, &self.source, &self.target, options, mirror);

        let snapshot = if options.dry_run {
            SnapshotStatus::NotWritten
        } else {
            let mut next = self.base;
            report.apply_to(&mut next);
            persist(&self.home, &self.pair, next)
        };

        SyncOutcome {
            pair: self.pair,
            plan: self.plan,
            report,
            snapshot,
            skipped: self.skipped,
        }
    }
}

/// `prepare_at` followed by `execute`, without a confirmation step.
pub fn sync_at(
    home: &Path,
    source: &Path,
    target: &Path,
    options: ExecuteOptions,
    mirror: &dyn Mirror,
) -> Result<SyncOutcome, SyncError> {
    Ok(prepare_at(home, source, target)?.execute(mirror, options))
}

fn persist(home: &Path, pair: &FolderPair, next: Snapshot) -> SnapshotStatus {
    let file = SnapshotFile::for_pair(pair, next);
    if let Err(err) = snapshot_store::save_snapshot_at(home, &file) {
        tracing::error!("could not save snapshot for pair {}: {err}", pair.id);
        if let Err(flag_err) = registry::mark_needs_reinit_at(home, &pair.id) {
            tracing::error!("could not flag pair {} for re-initialisation: {flag_err}", pair.id);
        }
        return SnapshotStatus::Failed {
            reason: err.to_string(),
        };
    }
    if let Err(err) = registry::record_sync_at(home, &pair.id) {
        tracing::warn!("could not record sync time for pair {}: {err}", pair.id);
    }
    SnapshotStatus::Saved
}

/// Exclusion sets for `source` and `target` as given. `swapped` means the pair
/// is registered as `(target, source)`; the stored side lists keep that
/// orientation.
fn load_exclusions(
    home: &Path,
    id: &PairId,
    swapped: bool,
    source: &Path,
    target: &Path,
) -> Result<(ExclusionSet, ExclusionSet), SyncError> {
    let (source_side, target_side) = if swapped {
        (Side::Target, Side::Source)
    } else {
        (Side::Source, Side::Target)
    };
    let source_excl = ExclusionSet::build(
        source,
        &excludes::load_patterns_at(home, id, source_side)?,
    );
    let target_excl = ExclusionSet::build(
        target,
        &excludes::load_patterns_at(home, id, target_side)?,
    );
    Ok((source_excl, target_excl))
}

/// Each scan already skipped its own exclusions; this hides them from the
/// other listing too, so an excluded path is neither copied over nor
/// overwritten.
fn exclude_from_both(
    source_excl: &ExclusionSet,
    target_excl: &ExclusionSet,
    source_tree: &mut DirectoryTree,
    target_tree: &mut DirectoryTree,
) {
    source_excl.prune(target_tree);
    target_excl.prune(source_tree);
}

/// Union of both sides' exclusions as rules for a whole-tree mirror.
fn mirror_excludes(source_excl: &ExclusionSet, target_excl: &ExclusionSet) -> Vec<MirrorExclude> {
    let mut rules = source_excl.mirror_excludes();
    rules.extend(target_excl.mirror_excludes());
    rules.sort();
    rules.dedup();
    rules
}

fn scan_both(
    source: &Path,
    source_excl: &ExclusionSet,
    target: &Path,
    target_excl: &ExclusionSet,
) -> Result<(ScanReport, ScanReport), SyncError> {
    let (source_scan, target_scan) = std::thread::scope(|s| {
        let source_job = s.spawn(|| scan::scan(source, source_excl));
        let target_scan = scan::scan(target, target_excl);
        let source_scan = source_job
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (source_scan, target_scan)
    });
    Ok((source_scan?, target_scan?))
}

/// A subtree unreadable on one side is removed from both listings so the
/// engine sees neither an addition nor a deletion there.
fn drop_skipped(
    source: ScanReport,
    target: ScanReport,
) -> (DirectoryTree, DirectoryTree, Vec<(Side, String)>) {
    let skipped: Vec<(Side, String)> = source
        .skipped
        .into_iter()
        .map(|rel| (Side::Source, rel))
        .chain(target.skipped.into_iter().map(|rel| (Side::Target, rel)))
        .collect();

    let (mut source_tree, mut target_tree) = (source.tree, target.tree);
    for (_, rel) in &skipped {
        for tree in [&mut source_tree, &mut target_tree] {
            tree.remove_subtree(rel);
            tree.remove_entry(rel);
        }
    }
    (source_tree, target_tree, skipped)
}

/// Copy what the old snapshot knew under `rel` into `base` unchanged.
fn carry_forward(old: &Snapshot, base: &mut Snapshot, rel: &str) {
    let prefix = format!("{rel}/");
    for (dir, files) in old.iter() {
        if dir == rel || dir.starts_with(&prefix) {
            base.insert_dir(dir.as_str());
            for name in files {
                base.insert_file(dir, name.clone());
            }
        }
    }
    let (parent, name) = pairsync_core::tree::split(rel);
    if old.contains_file(parent, name) {
        base.insert_file(parent, name);
    }
}

// ---------------------------------------------------------------------------
// First-time setup
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct InitOutcome {
    /// `source` and `target` canonicalized.
    pub source: PathBuf,
    pub target: PathBuf,
    pub transfer: MirrorOutcome,
    /// Registered pair; `None` for dry runs and failed transfers.
    pub pair: Option<FolderPair>,
    /// Directories recorded in the first snapshot.
    pub snapshot_dirs: usize,
}

/// Make `target` a copy of `source`, then record their mutual state as the
/// pair's first snapshot and register the pair.
///
/// Paths excluded on either side are neither copied nor deleted. A pair that
/// is already registered, in either orientation, keeps its orientation and
/// its side-specific exclusion lists.
pub fn init_pair_at(
    home: &Path,
    source: &Path,
    target: &Path,
    mirror: &dyn Mirror,
    dry_run: bool,
) -> Result<InitOutcome, SyncError> {
    let (source, target) = validate_roots(source, target)?;
    let id = PairId::derive(&source, &target);
    let _lock = PairLock::acquire_at(home, &id)?;

    let registered = match registry::find_pair_at(home, &source, &target) {
        Ok(pair) => Some(pair),
        Err(StoreError::PairNotFound { .. }) => None,
        Err(err) => return Err(err.into()),
    };
    let swapped = registered.as_ref().is_some_and(|pair| pair.source != source);
    let (source_excl, target_excl) = load_exclusions(home, &id, swapped, &source, &target)?;

    let transfer = mirror.mirror(&MirrorRequest {
        from: source.clone(),
        to: target.clone(),
        files: None,
        delete: true,
        dry_run,
        exclude: mirror_excludes(&source_excl, &target_excl),
    })?;
    if dry_run || !transfer.is_success() {
        return Ok(InitOutcome {
            source,
            target,
            transfer,
            pair: None,
            snapshot_dirs: 0,
        });
    }

    let pair = registered.unwrap_or_else(|| FolderPair::new(source.clone(), target.clone()));
    let (source_scan, target_scan) = scan_both(&source, &source_excl, &target, &target_excl)?;
    let (mut source_tree, mut target_tree) = (source_scan.tree, target_scan.tree);
    exclude_from_both(&source_excl, &target_excl, &mut source_tree, &mut target_tree);
    let mutual = Snapshot::mutual(&source_tree, &target_tree);
    let snapshot_dirs = mutual.len();

    snapshot_store::save_snapshot_at(home, &SnapshotFile::for_pair(&pair, mutual))?;
    let pair = registry::register_pair_at(home, pair.source, pair.target)?;
    tracing::info!(pair = %pair.id, dirs = snapshot_dirs, "initialised pair");

    Ok(InitOutcome {
        source,
        target,
        transfer,
        pair: Some(pair),
        snapshot_dirs,
    })
}
