//! `pairsync sync`: reconcile a registered pair in both directions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};

use pairsync_core::Side;
use pairsync_sync::{
    pipeline, EntryKind, ExecuteOptions, MirrorOutcome, PlanAction,
    ReconciliationPlan, SetStatus, SnapshotStatus, SyncOutcome,
};

use crate::Exit;

/// Arguments for `pairsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Source directory.
    pub source: PathBuf,

    /// Target directory.
    pub target: PathBuf,

    /// Propagate deletions. Without it planned deletions are reported and skipped.
    #[arg(long)]
    pub delete: bool,

    /// Show the plan without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

impl SyncArgs {
    pub fn run(self, verbose: bool) -> Result<Exit> {
        let home = super::home()?;
        let mirror = super::configured_mirror(&home)?;

        let prepared = pipeline::prepare_at(&home, &self.source, &self.target).with_context(|| {
            format!(
                "cannot sync {} and {}",
                self.source.display(),
                self.target.display()
            )
        })?;
        tracing::debug!(pair = %prepared.pair.id, items = prepared.plan.len(), "plan ready");

        for (side, rel) in &prepared.skipped {
            println!("{} unreadable in {side}, left untouched: {rel}", "!".yellow());
        }

        if prepared.plan.is_empty() {
            println!("{} already in sync", "✓".green());
        } else if verbose || self.dry_run {
            print_plan(&prepared.plan);
        } else {
            println!("Planned: {}", plan_summary(&prepared.plan));
        }
        if !self.delete && has_deletions(&prepared.plan) {
            println!(
                "{} deletions are disabled; pass --delete to apply them",
                "!".yellow()
            );
        }

        let ask = !prepared.plan.is_empty()
            && !self.yes
            && !self.dry_run
            && super::stdin_is_interactive();
        if ask && !super::confirm("Apply this plan?")? {
            println!("Aborted, nothing changed.");
            return Ok(Exit::Aborted);
        }

        let options = ExecuteOptions {
            delete_enabled: self.delete,
            dry_run: self.dry_run,
        };
        let outcome = prepared.execute(&mirror, options);
        Ok(report(&outcome, verbose, self.dry_run))
    }
}

fn has_deletions(plan: &ReconciliationPlan) -> bool {
    plan.count(PlanAction::DeleteFromSource) + plan.count(PlanAction::DeleteFromTarget) > 0
}

fn colored_action(action: PlanAction) -> ColoredString {
    match action {
        PlanAction::UpdateSourceToTarget | PlanAction::UpdateTargetToSource => {
            action.arrow().yellow()
        }
        PlanAction::AddToTarget | PlanAction::AddToSource => action.arrow().green(),
        PlanAction::DeleteFromSource | PlanAction::DeleteFromTarget => action.arrow().red(),
    }
}

fn print_plan(plan: &ReconciliationPlan) {
    for action in PlanAction::ALL {
        for (path, kind) in plan.items_of(action) {
            let suffix = if kind == EntryKind::Dir { "/" } else { "" };
            println!("  {}  {path}{suffix}", colored_action(action));
        }
    }
    println!("Planned: {}", plan_summary(plan));
}

fn plan_summary(plan: &ReconciliationPlan) -> String {
    let count = |a: PlanAction, b: PlanAction| plan.count(a) + plan.count(b);
    format!(
        "{} updated, {} added, {} deleted",
        count(PlanAction::UpdateSourceToTarget, PlanAction::UpdateTargetToSource),
        count(PlanAction::AddToTarget, PlanAction::AddToSource),
        count(PlanAction::DeleteFromSource, PlanAction::DeleteFromTarget),
    )
}

fn report(outcome: &SyncOutcome, verbose: bool, dry_run: bool) -> Exit {
    let report = &outcome.report;

    if verbose {
        for deletion in &report.deleted {
            println!("  {} {}: {}", "deleted".red(), deletion.side, deletion.path);
        }
        for transfer in &report.transfers {
            if let MirrorOutcome::Transferred { changes } = &transfer.outcome {
                for change in changes {
                    println!(
                        "  {} in {}: {}",
                        change.change.as_str(),
                        transfer.from.other(),
                        change.path
                    );
                }
            }
        }
    }

    for failure in &report.delete_failures {
        eprintln!(
            "{} could not delete {} from {}: {}",
            "✗".red(),
            failure.path,
            failure.side,
            failure.reason
        );
    }
    for skipped in &report.unlisted {
        eprintln!(
            "{} not copied from {}, the name contains a line break: {:?}",
            "✗".red(),
            skipped.from,
            skipped.path
        );
    }
    for transfer in &report.transfers {
        if let MirrorOutcome::Failed { code, stderr } = &transfer.outcome {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            eprintln!(
                "{} copy {} -> {} failed ({code}): {}",
                "✗".red(),
                transfer.from,
                transfer.from.other(),
                stderr.trim()
            );
        }
    }

    for side in [Side::Source, Side::Target] {
        let action = PlanAction::delete_from(side);
        if report.status(action) == SetStatus::SkippedDeletionsDisabled {
            println!(
                "{} {} deletion(s) from {side}: {}",
                "-".yellow(),
                outcome.plan.count(action),
                SetStatus::SkippedDeletionsDisabled.label()
            );
        }
    }

    if let SnapshotStatus::Failed { reason } = &outcome.snapshot {
        eprintln!(
            "{} could not save the pair state ({reason}); run `pairsync init` before the next sync",
            "✗".red()
        );
        return Exit::Failure;
    }
    if report.has_failures() {
        eprintln!("{} some changes failed and will be retried next run", "✗".red());
        return Exit::Failure;
    }

    if !outcome.plan.is_empty() {
        let prefix = if dry_run { "[dry-run] " } else { "" };
        println!(
            "{prefix}{} {} deleted, {} transfer(s)",
            "✓".green(),
            report.deleted.len(),
            report.transfers.len()
        );
    }
    Exit::Success
}
