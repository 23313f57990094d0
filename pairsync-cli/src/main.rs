//! pairsync: two-way folder synchronisation.
//!
//! # Usage
//!
//! ```text
//! pairsync init <source> <target> [--dry-run] [--yes]
//! pairsync sync <source> <target> [--delete] [--dry-run] [--yes]
//! pairsync pair list [--json]
//! pairsync pair remove <source> <target>
//! ```
//!
//! `--verbose` is accepted by every command.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{init::InitArgs, pair::PairCommand, sync::SyncArgs};
use pairsync_core::StoreError;
use pairsync_sync::SyncError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pairsync",
    version,
    about = "Keep two directory trees in sync in both directions",
    long_about = None,
)]
struct Cli {
    /// Report every decided action and every transferred item.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// First-time setup: make target a copy of source and start tracking the pair.
    Init(InitArgs),

    /// Reconcile a registered pair in both directions.
    Sync(SyncArgs),

    /// Inspect or forget registered pairs.
    Pair {
        #[command(subcommand)]
        command: PairCommand,
    },
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    Failure = 1,
    /// Bad paths or arguments. clap usage errors also exit with 2.
    Input = 2,
    /// The pair must be initialised (or re-initialised) first.
    SetupRequired = 3,
    /// The user declined the confirmation prompt.
    Aborted = 4,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn classify(err: &anyhow::Error) -> Exit {
    for cause in err.chain() {
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            if sync.requires_setup() {
                return Exit::SetupRequired;
            }
            if sync.is_input_error() {
                return Exit::Input;
            }
            return Exit::Failure;
        }
        if let Some(store) = cause.downcast_ref::<StoreError>() {
            if store.requires_setup() {
                return Exit::SetupRequired;
            }
            return Exit::Failure;
        }
    }
    Exit::Failure
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<Exit> {
    match cli.command {
        Commands::Init(args) => args.run(cli.verbose),
        Commands::Sync(args) => args.run(cli.verbose),
        Commands::Pair { command } => commands::pair::run(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            let exit = classify(&err);
            if exit == Exit::SetupRequired {
                eprintln!("Run `pairsync init <source> <target>` to set the pair up.");
            }
            exit.into()
        }
    }
}
