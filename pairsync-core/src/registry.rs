//! Folder-pair registry persisted as `~/.pairsync/pairs.yaml`.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.
//!
//! Pairs are matched in either orientation: `(a, b)` and `(b, a)` name the
//! same pair and share one snapshot.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, StoreError};
use crate::paths::{self, home};
use crate::snapshot_store;
use crate::types::{FolderPair, PairId, PairRegistry};

// ---------------------------------------------------------------------------
// 1. Load / save
// ---------------------------------------------------------------------------

/// Load `pairs.yaml`. A missing file is an empty registry.
///
/// Returns `StoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_registry_at(home: &Path) -> Result<PairRegistry, StoreError> {
    let path = paths::registry_path(home);
    if !path.exists() {
        return Ok(PairRegistry::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

/// `load_registry_at` convenience wrapper.
pub fn load_registry() -> Result<PairRegistry, StoreError> {
    load_registry_at(&home()?)
}

/// Atomically save `pairs.yaml`.
pub fn save_registry_at(home: &Path, registry: &PairRegistry) -> Result<(), StoreError> {
    let yaml = serde_yaml::to_string(registry)?;
    paths::write_atomic(&paths::registry_path(home), yaml.as_bytes())
}

// ---------------------------------------------------------------------------
// 2. Lookup
// ---------------------------------------------------------------------------

/// Find the pair registered for `(a, b)` in either orientation.
///
/// Returns `StoreError::PairNotFound` if there is none.
pub fn find_pair_at(home: &Path, a: &Path, b: &Path) -> Result<FolderPair, StoreError> {
    load_registry_at(home)?
        .pairs
        .into_iter()
        .find(|pair| pair.matches(a, b))
        .ok_or_else(|| StoreError::PairNotFound {
            source_root: a.to_path_buf(),
            target_root: b.to_path_buf(),
        })
}

/// `find_pair_at` convenience wrapper.
pub fn find_pair(a: &Path, b: &Path) -> Result<FolderPair, StoreError> {
    find_pair_at(&home()?, a, b)
}

/// All registered pairs, sorted by source then target path.
pub fn list_pairs_at(home: &Path) -> Result<Vec<FolderPair>, StoreError> {
    let mut pairs = load_registry_at(home)?.pairs;
    pairs.sort_by(|x, y| (&x.source, &x.target).cmp(&(&y.source, &y.target)));
    Ok(pairs)
}

/// `list_pairs_at` convenience wrapper.
pub fn list_pairs() -> Result<Vec<FolderPair>, StoreError> {
    list_pairs_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Mutations
// ---------------------------------------------------------------------------

/// Register `(source, target)`.
///
/// Idempotent: if the pair already exists (in either orientation) the
/// existing entry is reset to a clean state (`needs_reinit = false`) and
/// returned.
pub fn register_pair_at(
    home: &Path,
    source: PathBuf,
    target: PathBuf,
) -> Result<FolderPair, StoreError> {
    let mut registry = load_registry_at(home)?;
    if let Some(existing) = registry.pairs.iter_mut().find(|p| p.matches(&source, &target)) {
        existing.needs_reinit = false;
        let pair = existing.clone();
        save_registry_at(home, &registry)?;
        return Ok(pair);
    }

    let pair = FolderPair::new(source, target);
    registry.pairs.push(pair.clone());
    save_registry_at(home, &registry)?;
    Ok(pair)
}

/// `register_pair_at` convenience wrapper.
pub fn register_pair(source: PathBuf, target: PathBuf) -> Result<FolderPair, StoreError> {
    register_pair_at(&home()?, source, target)
}

/// Unregister the pair for `(a, b)` and delete its stored snapshot.
pub fn remove_pair_at(home: &Path, a: &Path, b: &Path) -> Result<FolderPair, StoreError> {
    let mut registry = load_registry_at(home)?;
    let Some(index) = registry.pairs.iter().position(|p| p.matches(a, b)) else {
        return Err(StoreError::PairNotFound {
            source_root: a.to_path_buf(),
            target_root: b.to_path_buf(),
        });
    };
    let pair = registry.pairs.remove(index);
    save_registry_at(home, &registry)?;
    snapshot_store::remove_snapshot_at(home, &pair.id)?;
    Ok(pair)
}

/// `remove_pair_at` convenience wrapper.
pub fn remove_pair(a: &Path, b: &Path) -> Result<FolderPair, StoreError> {
    remove_pair_at(&home()?, a, b)
}

/// Flag a pair whose snapshot could not be written.
pub fn mark_needs_reinit_at(home: &Path, id: &PairId) -> Result<(), StoreError> {
    update_pair_at(home, id, |pair| pair.needs_reinit = true)
}

/// Record a completed run: stamps `last_synced_at` and clears `needs_reinit`.
pub fn record_sync_at(home: &Path, id: &PairId) -> Result<(), StoreError> {
    let now = Utc::now();
    update_pair_at(home, id, |pair| {
        pair.last_synced_at = Some(now);
        pair.needs_reinit = false;
    })
}

fn update_pair_at(
    home: &Path,
    id: &PairId,
    update: impl FnOnce(&mut FolderPair),
) -> Result<(), StoreError> {
    let mut registry = load_registry_at(home)?;
    let Some(pair) = registry.pairs.iter_mut().find(|p| &p.id == id) else {
        return Ok(());
    };
    update(pair);
    save_registry_at(home, &registry)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
