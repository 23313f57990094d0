//! `pairsync pair list|remove`: registry housekeeping.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use pairsync_core::{registry, types::FolderPair};

use crate::Exit;

#[derive(Subcommand, Debug)]
pub enum PairCommand {
    /// Show every registered pair.
    List(ListArgs),

    /// Forget a pair and its stored state. Files are not touched.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub source: PathBuf,
    pub target: PathBuf,
}

pub fn run(command: PairCommand) -> Result<Exit> {
    let home = super::home()?;
    match command {
        PairCommand::List(args) => list(&home, args.json),
        PairCommand::Remove(args) => remove(&home, &args.source, &args.target),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PairJson<'a> {
    id: &'a str,
    source: &'a Path,
    target: &'a Path,
    created_at: String,
    last_synced_at: Option<String>,
    needs_reinit: bool,
}

#[derive(Tabled)]
struct PairRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
    #[tabled(rename = "status")]
    status: String,
}

fn list(home: &Path, json: bool) -> Result<Exit> {
    let pairs = registry::list_pairs_at(home).context("failed to load the pair registry")?;

    if json {
        let payload: Vec<PairJson<'_>> = pairs
            .iter()
            .map(|pair| PairJson {
                id: pair.id.as_str(),
                source: &pair.source,
                target: &pair.target,
                created_at: pair.created_at.to_rfc3339(),
                last_synced_at: pair.last_synced_at.map(|t| t.to_rfc3339()),
                needs_reinit: pair.needs_reinit,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize pairs")?
        );
        return Ok(Exit::Success);
    }

    if pairs.is_empty() {
        println!("No pairs registered. Run `pairsync init <source> <target>` to add one.");
        return Ok(Exit::Success);
    }

    let rows: Vec<PairRow> = pairs.iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let stale = pairs.iter().filter(|p| p.needs_reinit).count();
    if stale > 0 {
        println!(
            "{} {stale} pair(s) need `pairsync init` before they can sync again",
            "!".yellow()
        );
    }
    Ok(Exit::Success)
}

fn row(pair: &FolderPair) -> PairRow {
    PairRow {
        id: pair.id.to_string(),
        source: pair.source.display().to_string(),
        target: pair.target.display().to_string(),
        last_sync: pair
            .last_synced_at
            .map_or_else(|| "never".to_string(), |t| format!("{} ago", age(t, Utc::now()))),
        status: if pair.needs_reinit {
            "needs init".to_string()
        } else {
            "ok".to_string()
        },
    }
}

fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(then).num_seconds().max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

// ---------------------------------------------------------------------------
// remove
// ---------------------------------------------------------------------------

fn remove(home: &Path, source: &Path, target: &Path) -> Result<Exit> {
    // Registered roots are canonical; a root that no longer exists is matched as given.
    let source = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let target = target.canonicalize().unwrap_or_else(|_| target.to_path_buf());

    let pair = registry::remove_pair_at(home, &source, &target).with_context(|| {
        format!(
            "cannot remove pair {} <-> {}",
            source.display(),
            target.display()
        )
    })?;
    println!(
        "{} removed pair {} ({} <-> {})",
        "✓".green(),
        pair.id,
        pair.source.display(),
        pair.target.display()
    );
    Ok(Exit::Success)
}
