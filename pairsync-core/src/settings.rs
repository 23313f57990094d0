//! User settings from `~/.pairsync/config.yaml`.
//!
//! ```yaml
//! mirror:
//!   program: /usr/local/bin/rsync
//!   extra_args: ["--no-perms"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths::{self, home};

/// Root of `config.yaml`. Every field has a default, so a missing file or a
/// partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub mirror: MirrorSettings,
}

/// How the external mirror tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Executable name or path.
    pub program: PathBuf,
    /// Appended after the built-in flags, before the roots.
    pub extra_args: Vec<String>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rsync"),
            extra_args: Vec::new(),
        }
    }
}

/// Load settings; defaults if `config.yaml` does not exist.
pub fn load_settings_at(home: &Path) -> Result<Settings, StoreError> {
    let path = paths::settings_path(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    // An empty document deserializes as unit, not as a mapping.
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

/// `load_settings_at` convenience wrapper.
pub fn load_settings() -> Result<Settings, StoreError> {
    load_settings_at(&home()?)
}
