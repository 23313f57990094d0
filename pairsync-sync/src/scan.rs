//! Tree scanner.
//!
//! Walks one tree top-down and lists, per relative directory, the names of
//! the files and symlinks directly inside it. Symlinks are never followed,
//! including symlinks to directories: they are compared by their own
//! timestamp like any other file. Excluded directories are pruned before
//! they are entered.
//!
//! An unreadable subdirectory does not fail the scan. It is logged, dropped
//! from the listing and reported in [`ScanReport::skipped`] so the caller can
//! keep the same subtree out of the comparison on the other side too.

use std::path::Path;

use walkdir::WalkDir;

use pairsync_core::tree::{self, DirectoryTree, ROOT};

use crate::error::{io_err, SyncError};
use crate::exclude::ExclusionSet;

/// Result of scanning one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub tree: DirectoryTree,
    /// Relative paths of subdirectories that could not be read.
    pub skipped: Vec<String>,
}

/// Scan the tree at `root`.
///
/// Fails with [`SyncError::NotADirectory`] when `root` is missing or not a
/// directory, and with [`SyncError::Io`] when `root` itself cannot be read.
pub fn scan(root: &Path, exclusions: &ExclusionSet) -> Result<ScanReport, SyncError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            return Err(SyncError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
    }

    let mut raw = DirectoryTree::new();
    raw.insert_dir(ROOT);
    let mut skipped = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match tree::relative(root, entry.path()) {
                Some(rel) => !exclusions.is_dir_excluded(&rel),
                None => false,
            }
        });

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    return Err(io_err(root, std::io::Error::from(err)));
                }
                let Some(rel) = err.path().and_then(|p| tree::relative(root, p)) else {
                    tracing::warn!("scan error under {}: {err}", root.display());
                    continue;
                };
                tracing::warn!("skipping unreadable '{rel}' in {}: {err}", root.display());
                raw.remove_subtree(&rel);
                skipped.push(rel);
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }
        let Some(rel) = tree::relative(root, entry.path()) else {
            tracing::warn!("skipping non UTF-8 path {}", entry.path().display());
            continue;
        };
        if entry.file_type().is_dir() {
            raw.insert_dir(rel);
        } else {
            let (dir, name) = tree::split(&rel);
            raw.insert_entry(dir, name);
        }
    }

    let tree = if exclusions.is_empty() {
        raw
    } else {
        raw.iter()
            .map(|(dir, names)| (dir.clone(), exclusions.get_non_excluded(dir, names)))
            .collect()
    };
    tracing::debug!(
        root = %root.display(),
        dirs = tree.len(),
        entries = tree.entry_count(),
        skipped = skipped.len(),
        "scanned tree"
    );
    Ok(ScanReport { tree, skipped })
}
