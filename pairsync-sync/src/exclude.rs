//! Exclusion filter.
//!
//! Built once per tree per run from literal paths and glob patterns, both
//! resolved relative to the tree root. A pattern that resolves to a directory
//! prunes that directory and everything below it; a pattern that resolves to
//! a file or symlink hides that name in its parent directory. A pattern whose
//! last segment is a bare `*` additionally hides every file directly inside
//! the matched parent directories, including files created after the set was
//! built.
//!
//! Patterns that match nothing are ignored: exclusion lists are shared by
//! both sides and routinely name paths that only exist on one of them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glob::Pattern;
use pairsync_core::tree::{self, DirectoryTree, EntrySet};

use crate::mirror::MirrorExclude;

/// Excluded file names of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludedNames {
    /// Every file directly in the directory.
    All,
    Names(BTreeSet<String>),
}

impl ExcludedNames {
    fn contains(&self, name: &str) -> bool {
        match self {
            ExcludedNames::All => true,
            ExcludedNames::Names(names) => names.contains(name),
        }
    }
}

/// Excluded directories (pruned with all descendants) and excluded file
/// names per directory. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, ExcludedNames>,
}

impl ExclusionSet {
    /// The empty set: nothing is excluded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve `patterns` against `base_dir`.
    pub fn build<S: AsRef<str>>(base_dir: &Path, patterns: &[S]) -> Self {
        let mut set = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            set.add_pattern(base_dir, pattern);
        }
        tracing::debug!(
            base = %base_dir.display(),
            dirs = set.dirs.len(),
            file_dirs = set.files.len(),
            "built exclusion set"
        );
        set
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// True when the directory at relative path `dir` is pruned.
    pub fn is_dir_excluded(&self, dir: &str) -> bool {
        self.dirs.contains(dir)
    }

    /// True when the file `name` inside `dir` is hidden.
    pub fn is_file_excluded(&self, dir: &str, name: &str) -> bool {
        self.files.get(dir).is_some_and(|names| names.contains(name))
    }

    /// `names` minus whatever is excluded for `dir`.
    pub fn get_non_excluded<'a, I>(&self, dir: &str, names: I) -> EntrySet
    where
        I: IntoIterator<Item = &'a String>,
    {
        match self.files.get(dir) {
            None => names.into_iter().cloned().collect(),
            Some(excluded) => names
                .into_iter()
                .filter(|name| !excluded.contains(name))
                .cloned()
                .collect(),
        }
    }

    /// Excluded directory paths, sorted.
    pub fn excluded_dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    /// Drop everything this set hides from a listing of the other tree, so a
    /// path excluded on one side is invisible on both.
    pub fn prune(&self, listing: &mut DirectoryTree) {
        for dir in &self.dirs {
            listing.remove_subtree(dir);
            listing.remove_entry(dir);
        }
        for (dir, excluded) in &self.files {
            let doomed: Vec<String> = match excluded {
                ExcludedNames::All => listing
                    .entries(dir)
                    .map(|names| names.iter().cloned().collect())
                    .unwrap_or_default(),
                ExcludedNames::Names(names) => names.iter().cloned().collect(),
            };
            for name in doomed {
                let path = tree::join(dir, &name);
                listing.remove_entry(&path);
                if matches!(excluded, ExcludedNames::Names(_)) {
                    listing.remove_subtree(&path);
                }
            }
        }
    }

    /// The same exclusions as rules for a whole-tree mirror run.
    pub fn mirror_excludes(&self) -> Vec<MirrorExclude> {
        let mut rules: Vec<MirrorExclude> =
            self.dirs.iter().cloned().map(MirrorExclude::Dir).collect();
        for (dir, excluded) in &self.files {
            match excluded {
                ExcludedNames::All => rules.push(MirrorExclude::FilesIn(dir.clone())),
                ExcludedNames::Names(names) => rules.extend(
                    names
                        .iter()
                        .map(|name| MirrorExclude::File(tree::join(dir, name))),
                ),
            }
        }
        rules
    }

    fn add_pattern(&mut self, base_dir: &Path, pattern: &str) {
        let literal = resolve(base_dir, pattern);
        if literal.symlink_metadata().is_ok() {
            self.add_path(base_dir, &literal);
            return;
        }

        let escaped_base = Pattern::escape(&base_dir.to_string_lossy());
        let full = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            format!("{}/{}", escaped_base.trim_end_matches('/'), pattern)
        };

        let paths = match glob::glob(&full) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!("ignoring invalid exclude pattern '{pattern}': {err}");
                return;
            }
        };
        for entry in paths {
            match entry {
                Ok(path) => self.add_path(base_dir, &path),
                Err(err) => tracing::warn!("exclude pattern '{pattern}': {err}"),
            }
        }

        if let Some(parent) = full.strip_suffix("/*") {
            self.add_all_files_of(base_dir, parent);
        }
    }

    /// `parent_pattern` is the glob of a pattern ending in `/*`: every
    /// directory it matches has all of its files hidden.
    fn add_all_files_of(&mut self, base_dir: &Path, parent_pattern: &str) {
        let Ok(parents) = glob::glob(parent_pattern) else {
            return;
        };
        for parent in parents.flatten() {
            let is_dir = parent.symlink_metadata().is_ok_and(|m| m.is_dir());
            if !is_dir {
                continue;
            }
            if let Some(rel) = tree::relative(base_dir, &parent) {
                self.files.insert(rel, ExcludedNames::All);
            }
        }
    }

    fn add_path(&mut self, base_dir: &Path, path: &Path) {
        let Some(rel) = tree::relative(base_dir, path) else {
            tracing::warn!(
                "ignoring exclude path outside {}: {}",
                base_dir.display(),
                path.display()
            );
            return;
        };
        if rel.is_empty() {
            tracing::warn!("ignoring exclude pattern that matches the tree root");
            return;
        }
        let Ok(meta) = path.symlink_metadata() else {
            return;
        };

        if meta.is_dir() {
            self.dirs.insert(rel);
            return;
        }

        let (dir, name) = tree::split(&rel);
        let entry = self
            .files
            .entry(dir.to_string())
            .or_insert_with(|| ExcludedNames::Names(BTreeSet::new()));
        if let ExcludedNames::Names(names) = entry {
            names.insert(name.to_string());
        }
    }
}

fn resolve(base_dir: &Path, pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
