//! Engine behaviour on real trees: scan both sides, reconcile against a
//! snapshot, inspect the plan.

mod common;

use pairsync_core::tree::Snapshot;
use pairsync_core::Side;
use pairsync_sync::{
    reconcile, scan, Conflict, Conflicts, ExclusionSet, PlanAction, Reconciliation, SyncError,
};
use rstest::rstest;

use common::{mkdir, snapshot, write_file, Fixture};

fn run(fx: &Fixture, old: &Snapshot) -> Result<Reconciliation, SyncError> {
    let source = scan(fx.src(), &ExclusionSet::empty())?.tree;
    let target = scan(fx.tgt(), &ExclusionSet::empty())?.tree;
    reconcile(&source, &target, old, fx.src(), fx.tgt())
}

fn paths<'a>(result: &'a Reconciliation, action: PlanAction) -> Vec<&'a str> {
    result.plan.paths(action).collect()
}

/// Only `action` carries `path`.
fn only_in(result: &Reconciliation, path: &str, action: PlanAction) {
    for other in PlanAction::ALL {
        let present = result.plan.paths(other).any(|p| p == path);
        assert_eq!(present, other == action, "{path} in {other}");
    }
}

#[test]
fn identical_trees_with_current_snapshot_plan_nothing() {
    let fx = Fixture::new();
    for root in [fx.src(), fx.tgt()] {
        write_file(root, "readme.md", 0);
        write_file(root, "docs/a.txt", 5);
        mkdir(root, "empty");
    }
    let old = snapshot(&[("", &["readme.md"]), ("docs", &["a.txt"]), ("empty", &[])]);

    let result = run(&fx, &old).unwrap();
    assert!(result.plan.is_empty(), "plan: {:?}", result.plan);
    assert_eq!(result.snapshot, old);
}

#[test]
fn new_directory_on_source_is_added_to_target() {
    let fx = Fixture::new();
    write_file(fx.src(), "docs/a.txt", 0);

    let result = run(&fx, &snapshot(&[("", &[])])).unwrap();
    assert_eq!(paths(&result, PlanAction::AddToTarget), vec!["docs", "docs/a.txt"]);
    assert!(paths(&result, PlanAction::DeleteFromSource).is_empty());
    assert!(paths(&result, PlanAction::DeleteFromTarget).is_empty());
    assert_eq!(result.plan.len(), 2);
}

#[test]
fn deletion_on_source_propagates_to_target() {
    let fx = Fixture::new();
    mkdir(fx.src(), "docs");
    write_file(fx.tgt(), "docs/a.txt", 0);
    let old = snapshot(&[("", &[]), ("docs", &["a.txt"])]);

    let result = run(&fx, &old).unwrap();
    assert_eq!(paths(&result, PlanAction::DeleteFromTarget), vec!["docs/a.txt"]);
    assert!(paths(&result, PlanAction::AddToSource).is_empty());
    assert!(paths(&result, PlanAction::AddToTarget).is_empty());
    assert!(result.snapshot.contains_file("docs", "a.txt"));
}

#[rstest]
#[case::source_newer(10, Some(PlanAction::UpdateSourceToTarget))]
#[case::same_time(0, None)]
#[case::target_newer(-10, Some(PlanAction::UpdateTargetToSource))]
fn mutual_file_follows_newer_side(#[case] source_offset: i64, #[case] expected: Option<PlanAction>) {
    let fx = Fixture::new();
    write_file(fx.src(), "shared/report.csv", source_offset);
    write_file(fx.tgt(), "shared/report.csv", 0);
    let old = snapshot(&[("", &[]), ("shared", &["report.csv"])]);

    let result = run(&fx, &old).unwrap();
    match expected {
        Some(action) => only_in(&result, "shared/report.csv", action),
        None => assert!(result.plan.is_empty()),
    }
}

#[test]
fn file_unique_to_source_is_added_or_deleted_by_snapshot() {
    let fx = Fixture::new();
    write_file(fx.src(), "fresh.txt", 0);
    write_file(fx.src(), "removed-on-target.txt", 0);
    mkdir(fx.tgt(), "");
    let old = snapshot(&[("", &["removed-on-target.txt"])]);

    let result = run(&fx, &old).unwrap();
    only_in(&result, "fresh.txt", PlanAction::AddToTarget);
    only_in(&result, "removed-on-target.txt", PlanAction::DeleteFromSource);
}

#[test]
fn known_directory_missing_on_one_side_is_deleted_with_its_files() {
    let fx = Fixture::new();
    write_file(fx.tgt(), "old/x", 0);
    write_file(fx.tgt(), "old/y", 0);
    mkdir(fx.src(), "");
    let old = snapshot(&[("", &[]), ("old", &["x", "y"])]);

    let result = run(&fx, &old).unwrap();
    assert_eq!(
        paths(&result, PlanAction::DeleteFromTarget),
        vec!["old", "old/x", "old/y"]
    );
}

#[test]
fn file_on_one_side_and_directory_on_other_is_a_conflict() {
    let fx = Fixture::new();
    write_file(fx.src(), "notes", 0);
    write_file(fx.tgt(), "notes/today.md", 0);

    let err = run(&fx, &snapshot(&[("", &[])])).unwrap_err();
    let SyncError::Conflict(Conflicts(conflicts)) = err else {
        panic!("expected conflict, got {err}");
    };
    assert_eq!(
        conflicts,
        vec![Conflict::TypeMismatch {
            path: "notes".to_string(),
            file_side: Side::Source,
        }]
    );
}

#[test]
fn excluded_entries_never_reach_the_listing() {
    let fx = Fixture::new();
    write_file(fx.src(), "keep.txt", 0);
    write_file(fx.src(), "scratch.tmp", 0);
    write_file(fx.src(), "cache/blob", 0);
    write_file(fx.src(), "docs/draft.tmp", 0);

    let excl = ExclusionSet::build(fx.src(), &["cache", "**/*.tmp"]);
    let tree = scan(fx.src(), &excl).unwrap().tree;

    assert!(tree.contains_entry("keep.txt"));
    for hidden in ["scratch.tmp", "docs/draft.tmp", "cache/blob"] {
        assert!(!tree.contains_entry(hidden), "{hidden} leaked into listing");
    }
    assert!(!tree.contains_dir("cache"));
    assert!(tree.contains_dir("docs"));
}

#[test]
fn excluded_paths_are_not_planned_either() {
    let fx = Fixture::new();
    write_file(fx.src(), "build/out.bin", 0);
    write_file(fx.src(), "src/main.rs", 0);
    mkdir(fx.tgt(), "");

    let source = scan(fx.src(), &ExclusionSet::build(fx.src(), &["build"])).unwrap().tree;
    let target = scan(fx.tgt(), &ExclusionSet::build(fx.tgt(), &["build"])).unwrap().tree;
    let result = reconcile(&source, &target, &snapshot(&[("", &[])]), fx.src(), fx.tgt()).unwrap();

    assert_eq!(paths(&result, PlanAction::AddToTarget), vec!["src", "src/main.rs"]);
    assert!(result.plan.get("build").is_none());
    assert!(!fx.tgt().join("build").exists());
}
