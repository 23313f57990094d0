//! Layout of the `~/.pairsync/` state directory.
//!
//! ```text
//! ~/.pairsync/
//!   config.yaml                 (settings, optional)
//!   pairs.yaml                  (pair registry)
//!   snapshots/<pair_id>.json    (last mutual state per pair)
//!   excludes/<pair_id>.txt      (patterns for both sides)
//!   excludes/<pair_id>.<side>.txt
//!   locks/<pair_id>.lock
//! ```

use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};
use crate::types::{PairId, Side};

pub const STATE_DIR: &str = ".pairsync";

pub fn state_root(home: &Path) -> PathBuf {
    home.join(STATE_DIR)
}

pub fn settings_path(home: &Path) -> PathBuf {
    state_root(home).join("config.yaml")
}

pub fn registry_path(home: &Path) -> PathBuf {
    state_root(home).join("pairs.yaml")
}

pub fn snapshots_dir(home: &Path) -> PathBuf {
    state_root(home).join("snapshots")
}

pub fn snapshot_path(home: &Path, pair: &PairId) -> PathBuf {
    snapshots_dir(home).join(format!("{pair}.json"))
}

pub fn excludes_dir(home: &Path) -> PathBuf {
    state_root(home).join("excludes")
}

/// Pattern list shared by both sides of a pair.
pub fn shared_excludes_path(home: &Path, pair: &PairId) -> PathBuf {
    excludes_dir(home).join(format!("{pair}.txt"))
}

/// Pattern list applied to one side only.
pub fn side_excludes_path(home: &Path, pair: &PairId, side: Side) -> PathBuf {
    excludes_dir(home).join(format!("{pair}.{side}.txt"))
}

pub fn locks_dir(home: &Path) -> PathBuf {
    state_root(home).join("locks")
}

pub fn lock_path(home: &Path, pair: &PairId) -> PathBuf {
    locks_dir(home).join(format!("{pair}.lock"))
}

/// `dirs::home_dir()` or [`StoreError::HomeNotFound`].
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// Create `dir` (mode `0700`) if it does not exist yet.
pub fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    set_dir_permissions(dir)
}

/// Write `contents` to `path` atomically: sibling `.tmp` → `chmod 0600` → rename.
///
/// `.tmp` is always in the same directory as the target, so the rename never
/// crosses filesystems.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("path has no parent directory")));
    };
    ensure_private_dir(dir)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
