pub mod init;
pub mod pair;
pub mod sync;

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use pairsync_core::settings;
use pairsync_sync::RsyncMirror;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// The mirror tool configured in `config.yaml`.
pub(crate) fn configured_mirror(home: &std::path::Path) -> Result<RsyncMirror> {
    let settings = settings::load_settings_at(home).context("failed to load config.yaml")?;
    Ok(RsyncMirror::new(&settings.mirror))
}

pub(crate) fn stdin_is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Ask a yes/no question until answered. Empty input or EOF is a no.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("{question} (y/yes, n/no) --> ");
        stdout.flush().context("failed to flush stdout")?;

        let mut answer = String::new();
        let read = stdin
            .lock()
            .read_line(&mut answer)
            .context("failed to read answer")?;
        if read == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => continue,
        }
    }
}
