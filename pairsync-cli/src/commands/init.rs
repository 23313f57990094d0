//! `pairsync init <source> <target>`
//!
//! Makes `target` an exact copy of `source`, records the result as the pair's
//! first snapshot and registers the pair. Also used to re-initialise a pair
//! whose stored state was lost.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pairsync_sync::{
    pipeline::{self, InitOutcome},
    MirrorOutcome,
};

use crate::Exit;

/// Set up (or reset) a pair.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory whose content wins.
    pub source: PathBuf,

    /// Directory that becomes a copy of `source`. Files missing from
    /// `source` are deleted here.
    pub target: PathBuf,

    /// Show what would be copied and deleted without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

impl InitArgs {
    pub fn run(self, verbose: bool) -> Result<Exit> {
        let home = super::home()?;
        let mirror = super::configured_mirror(&home)?;

        let (source, target) = pipeline::validate_roots(&self.source, &self.target)
            .context("cannot initialise pair")?;
        tracing::debug!(source = %source.display(), target = %target.display(), "validated roots");
        println!(
            "{} {} will become an exact copy of {}; anything only in the target is deleted",
            "!".yellow(),
            target.display(),
            source.display()
        );

        if !self.dry_run && !self.yes {
            if !super::stdin_is_interactive() {
                eprintln!("Refusing to initialise without confirmation; pass --yes to proceed.");
                return Ok(Exit::Aborted);
            }
            let preview = pipeline::init_pair_at(&home, &source, &target, &mirror, true)
                .context("cannot preview initialisation")?;
            print_changes(&preview.transfer, true);
            if !super::confirm("Proceed?")? {
                println!("Aborted, nothing changed.");
                return Ok(Exit::Aborted);
            }
        }

        let outcome = pipeline::init_pair_at(&home, &source, &target, &mirror, self.dry_run)
            .context("cannot initialise pair")?;
        Ok(report(&outcome, verbose || self.dry_run, self.dry_run))
    }
}

fn print_changes(transfer: &MirrorOutcome, dry_run: bool) {
    let MirrorOutcome::Transferred { changes } = transfer else {
        return;
    };
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for change in changes {
        println!("  {prefix}{:<8} {}", change.change.as_str(), change.path);
    }
}

fn report(outcome: &InitOutcome, list_changes: bool, dry_run: bool) -> Exit {
    if list_changes {
        print_changes(&outcome.transfer, dry_run);
    }

    if let MirrorOutcome::Failed { code, stderr } = &outcome.transfer {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        eprintln!(
            "{} copying {} -> {} failed ({code}): {}",
            "✗".red(),
            outcome.source.display(),
            outcome.target.display(),
            stderr.trim()
        );
        eprintln!("The pair was not registered.");
        return Exit::Failure;
    }

    match &outcome.pair {
        Some(pair) => println!(
            "{} initialised pair {} ({} directories tracked)",
            "✓".green(),
            pair.id,
            outcome.snapshot_dirs
        ),
        None => println!("[dry-run] nothing changed, pair not registered"),
    }
    Exit::Success
}
