//! Domain types for the pairsync registry.
//!
//! All path fields use `PathBuf`; relative tree paths (which are always
//! `/`-separated, see [`crate::tree`]) use `String`.
//! All types are serializable/deserializable via serde.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Persistent identifier of a tree-pair.
///
/// Derived from the two canonical root paths, independent of which one is
/// called source and which target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId(pub String);

impl PairId {
    /// Number of hex characters kept from the SHA-256 digest.
    pub const LEN: usize = 16;

    /// Compute the id of the pair `(a, b)`. `derive(a, b) == derive(b, a)`.
    pub fn derive(a: &Path, b: &Path) -> Self {
        let a = a.to_string_lossy();
        let b = b.to_string_lossy();
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        let mut hasher = Sha256::new();
        hasher.update(first.as_bytes());
        hasher.update([0u8]);
        hasher.update(second.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(Self::LEN);
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PairId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PairId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One of the two trees of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A registered (source, target) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPair {
    pub id: PairId,
    /// Canonical absolute path of the source root.
    pub source: PathBuf,
    /// Canonical absolute path of the target root.
    pub target: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Set when the last snapshot write failed; the stored snapshot can no
    /// longer be trusted and the pair must go through `init` again.
    #[serde(default)]
    pub needs_reinit: bool,
}

impl FolderPair {
    pub fn new(source: PathBuf, target: PathBuf) -> Self {
        Self {
            id: PairId::derive(&source, &target),
            source,
            target,
            created_at: Utc::now(),
            last_synced_at: None,
            needs_reinit: false,
        }
    }

    /// True when `(a, b)` names this pair in either orientation.
    pub fn matches(&self, a: &Path, b: &Path) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Root of the `pairs.yaml` registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRegistry {
    pub version: u32,
    #[serde(default)]
    pub pairs: Vec<FolderPair>,
}

impl Default for PairRegistry {
    fn default() -> Self {
        Self {
            version: 1,
            pairs: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
