//! Directory listings keyed by relative directory path.
//!
//! Relative paths use `/` as the separator regardless of platform, never carry
//! a leading or trailing separator, and the tree root is the empty string.
//! Directories are represented only by their own key; the entry sets hold the
//! names of files and symlinks directly inside that directory.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// Names of the files (and symlinks) directly inside one directory.
pub type EntrySet = BTreeSet<String>;

/// Relative path of the tree root.
pub const ROOT: &str = "";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Join a relative directory and an entry name: `join("", "a") == "a"`,
/// `join("a/b", "c") == "a/b/c"`.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Split a relative path into `(parent, name)`. The parent of a top-level
/// entry is [`ROOT`].
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (ROOT, path),
    }
}

/// Number of segments in a relative path (`""` has depth 0).
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Relative path of `path` below `root` in canonical `/` form.
///
/// Returns `None` when `path` is not below `root`, climbs with `..`, or has a
/// component that is not valid UTF-8.
pub fn relative(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Absolute filesystem path of a relative tree path below `root`.
pub fn absolute(root: &Path, rel: &str) -> std::path::PathBuf {
    if rel.is_empty() {
        return root.to_path_buf();
    }
    rel.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

// ---------------------------------------------------------------------------
// DirectoryTree
// ---------------------------------------------------------------------------

/// Listing of one tree as produced by a scan. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryTree(BTreeMap<String, EntrySet>);

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory (idempotent).
    pub fn insert_dir(&mut self, dir: impl Into<String>) {
        self.0.entry(dir.into()).or_default();
    }

    /// Record a file or symlink named `name` inside `dir`, creating the
    /// directory key if needed.
    pub fn insert_entry(&mut self, dir: &str, name: impl Into<String>) {
        self.0.entry(dir.to_string()).or_default().insert(name.into());
    }

    /// Drop a directory key and every key below it.
    pub fn remove_subtree(&mut self, dir: &str) {
        let prefix = format!("{dir}/");
        self.0.retain(|key, _| key != dir && !key.starts_with(&prefix));
    }

    /// Drop a single file/symlink entry. The directory key stays.
    pub fn remove_entry(&mut self, path: &str) -> bool {
        let (dir, name) = split(path);
        self.0.get_mut(dir).is_some_and(|set| set.remove(name))
    }

    pub fn contains_dir(&self, dir: &str) -> bool {
        self.0.contains_key(dir)
    }

    pub fn entries(&self, dir: &str) -> Option<&EntrySet> {
        self.0.get(dir)
    }

    /// True when `path` is listed as a file/symlink entry.
    pub fn contains_entry(&self, path: &str) -> bool {
        let (dir, name) = split(path);
        self.0.get(dir).is_some_and(|set| set.contains(name))
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, EntrySet> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of file/symlink entries.
    pub fn entry_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}

impl FromIterator<(String, EntrySet)> for DirectoryTree {
    fn from_iter<I: IntoIterator<Item = (String, EntrySet)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Files present in both trees as of the end of the last successful
/// reconciliation: the common ancestor for the next three-way comparison.
///
/// An empty entry set is meaningful: the directory existed on both sides
/// without files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, EntrySet>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dir(&mut self, dir: impl Into<String>) {
        self.0.entry(dir.into()).or_default();
    }

    pub fn insert_file(&mut self, dir: &str, name: impl Into<String>) {
        self.0.entry(dir.to_string()).or_default().insert(name.into());
    }

    /// Forget a single file. The directory key stays.
    pub fn remove_file(&mut self, dir: &str, name: &str) -> bool {
        self.0.get_mut(dir).is_some_and(|set| set.remove(name))
    }

    /// Forget a directory key (not its descendants).
    pub fn remove_dir(&mut self, dir: &str) -> bool {
        self.0.remove(dir).is_some()
    }

    pub fn contains_dir(&self, dir: &str) -> bool {
        self.0.contains_key(dir)
    }

    /// True when `name` was recorded inside `dir`.
    pub fn contains_file(&self, dir: &str, name: &str) -> bool {
        self.0.get(dir).is_some_and(|set| set.contains(name))
    }

    pub fn files(&self, dir: &str) -> Option<&EntrySet> {
        self.0.get(dir)
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, EntrySet> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, EntrySet)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, EntrySet)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Snapshot {
    /// Mutual state of two trees: directories present in both, each with the
    /// files present in both.
    pub fn mutual(a: &DirectoryTree, b: &DirectoryTree) -> Self {
        a.iter()
            .filter_map(|(dir, a_files)| {
                b.entries(dir)
                    .map(|b_files| (dir.clone(), a_files.intersection(b_files).cloned().collect()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
