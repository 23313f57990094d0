//! Exclusion sources: newline-separated literal paths and glob patterns.
//!
//! Each pair has an optional shared list (`<pair_id>.txt`) plus an optional
//! list per side (`<pair_id>.source.txt`, `<pair_id>.target.txt`). Blank
//! lines and lines starting with `#` are ignored.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, StoreError};
use crate::paths::{self, home};
use crate::types::{PairId, Side};

/// Patterns that apply to `side` of `pair`: shared list first, then the
/// side-specific one. Missing files contribute nothing.
pub fn load_patterns_at(home: &Path, pair: &PairId, side: Side) -> Result<Vec<String>, StoreError> {
    let mut patterns = read_pattern_file(&paths::shared_excludes_path(home, pair))?;
    patterns.extend(read_pattern_file(&paths::side_excludes_path(home, pair, side))?);
    Ok(patterns)
}

/// `load_patterns_at` convenience wrapper.
pub fn load_patterns(pair: &PairId, side: Side) -> Result<Vec<String>, StoreError> {
    load_patterns_at(&home()?, pair, side)
}

/// Parse one pattern list.
pub fn parse_patterns(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn read_pattern_file(path: &Path) -> Result<Vec<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_patterns(&contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(io_err(path, err)),
    }
}
