//! Reconciliation plan: every decided action, keyed by relative path.
//!
//! The six decision sets are disjoint by construction: the plan stores one
//! [`PlanItem`] per path and refuses a second decision for the same path.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use pairsync_core::Side;

use crate::error::Conflict;

// ---------------------------------------------------------------------------
// PlanAction
// ---------------------------------------------------------------------------

/// Which decision set a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    UpdateSourceToTarget,
    UpdateTargetToSource,
    AddToTarget,
    AddToSource,
    DeleteFromSource,
    DeleteFromTarget,
}

impl PlanAction {
    pub const ALL: [PlanAction; 6] = [
        PlanAction::UpdateSourceToTarget,
        PlanAction::UpdateTargetToSource,
        PlanAction::AddToTarget,
        PlanAction::AddToSource,
        PlanAction::DeleteFromSource,
        PlanAction::DeleteFromTarget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanAction::UpdateSourceToTarget => "update_source_to_target",
            PlanAction::UpdateTargetToSource => "update_target_to_source",
            PlanAction::AddToTarget => "add_to_target",
            PlanAction::AddToSource => "add_to_source",
            PlanAction::DeleteFromSource => "delete_from_source",
            PlanAction::DeleteFromTarget => "delete_from_target",
        }
    }

    /// Update for a file found on both sides, newer on `from`.
    pub fn update_from(from: Side) -> Self {
        match from {
            Side::Source => PlanAction::UpdateSourceToTarget,
            Side::Target => PlanAction::UpdateTargetToSource,
        }
    }

    /// Addition of an item that only exists on `from`.
    pub fn add_from(from: Side) -> Self {
        match from {
            Side::Source => PlanAction::AddToTarget,
            Side::Target => PlanAction::AddToSource,
        }
    }

    /// Deletion of an item that only survives on `side`.
    pub fn delete_from(side: Side) -> Self {
        match side {
            Side::Source => PlanAction::DeleteFromSource,
            Side::Target => PlanAction::DeleteFromTarget,
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(self, PlanAction::DeleteFromSource | PlanAction::DeleteFromTarget)
    }

    /// The side whose files are read: the copy origin for transfers, the
    /// side being cleaned for deletions.
    pub fn side(self) -> Side {
        match self {
            PlanAction::UpdateSourceToTarget
            | PlanAction::AddToTarget
            | PlanAction::DeleteFromSource => Side::Source,
            PlanAction::UpdateTargetToSource
            | PlanAction::AddToSource
            | PlanAction::DeleteFromTarget => Side::Target,
        }
    }

    /// Short human label: `source -> target`, `delete (target)`.
    pub fn arrow(self) -> &'static str {
        match self {
            PlanAction::UpdateSourceToTarget => "update  source -> target",
            PlanAction::UpdateTargetToSource => "update  target -> source",
            PlanAction::AddToTarget => "add     source -> target",
            PlanAction::AddToSource => "add     target -> source",
            PlanAction::DeleteFromSource => "delete  from source",
            PlanAction::DeleteFromTarget => "delete  from target",
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PlanItem / ReconciliationPlan
// ---------------------------------------------------------------------------

/// Whether a planned path is a file entry or a directory key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub action: PlanAction,
    pub kind: EntryKind,
}

/// The engine's decisions for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReconciliationPlan {
    items: BTreeMap<String, PlanItem>,
}

impl ReconciliationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision. A path that already carries one is a
    /// [`Conflict::DuplicateDecision`] and the plan keeps the first.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        action: PlanAction,
        kind: EntryKind,
    ) -> Result<(), Conflict> {
        let path = path.into();
        if let Some(existing) = self.items.get(&path) {
            return Err(Conflict::DuplicateDecision {
                path,
                first: existing.action,
                second: action,
            });
        }
        tracing::debug!("{action}: {path}");
        self.items.insert(path, PlanItem { action, kind });
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&PlanItem> {
        self.items.get(path)
    }

    /// Paths of one decision set, sorted.
    pub fn paths(&self, action: PlanAction) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |(_, item)| item.action == action)
            .map(|(path, _)| path.as_str())
    }

    /// Items of one decision set with their kind, sorted by path.
    pub fn items_of(&self, action: PlanAction) -> impl Iterator<Item = (&str, EntryKind)> {
        self.items
            .iter()
            .filter(move |(_, item)| item.action == action)
            .map(|(path, item)| (path.as_str(), item.kind))
    }

    /// Every decision, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlanItem)> {
        self.items.iter().map(|(path, item)| (path.as_str(), item))
    }

    pub fn count(&self, action: PlanAction) -> usize {
        self.paths(action).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
