//! Merge planning: decide, per diff entry, whether to apply, skip, or
//! report a conflict.

use serde::{Deserialize, Serialize};

use scene_diff::{BranchDiff, ChangeKind, DiffEntry};
use scene_types::{Element, LineageId};

use crate::ancestor::{divergence, Divergence};
use crate::conflict::{ConflictType, MergeConflict};
use crate::error::MergeResult;

/// A change to apply to the target branch.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeAction {
    /// Copy a source element into target.
    Create { source: Element },
    /// Overwrite target content with source content.
    Update { source: Element, target: Element },
    /// Soft-delete a target element.
    Delete { source: Element, target: Element },
}

impl MergeAction {
    pub fn lineage_id(&self) -> LineageId {
        match self {
            Self::Create { source } | Self::Update { source, .. } | Self::Delete { source, .. } => {
                source.lineage_id
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Target changed since the common ancestor; source did not.
    TargetNewer,
    /// Target deleted the element and source never changed it.
    DeletedInTarget,
    /// Both sides already agree with the ancestor.
    NoChange,
}

/// A diff entry the merge leaves alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChange {
    pub lineage_id: LineageId,
    pub reason: SkipReason,
    pub description: String,
}

/// Everything a merge would do, computed without touching any store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergePlan {
    pub actions: Vec<MergeAction>,
    pub conflicts: Vec<MergeConflict>,
    pub skipped: Vec<SkippedChange>,
    /// `|Added| + |Modified| + |Deleted|` of the underlying diff.
    pub total_changes: usize,
}

impl MergePlan {
    /// A plan is clean when it has no conflicts.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

fn conflict(entry: &DiffEntry, conflict_type: ConflictType, detail: &str) -> MergeConflict {
    let target_row = entry.target.as_ref().or(entry.target_tombstone.as_ref());
    let changed_fields = match target_row {
        Some(t) => t.changed_fields(&entry.source),
        None => Vec::new(),
    };
    MergeConflict {
        conflict_type,
        lineage_id: entry.lineage_id,
        element_type: entry.element_type(),
        source_element_id: entry.source.id,
        target_element_id: target_row.map(|t| t.id),
        changed_fields,
        description: format!(
            "{} '{}': {detail}",
            entry.element_type(),
            entry.source.name
        ),
    }
}

fn skip(entry: &DiffEntry, reason: SkipReason) -> SkippedChange {
    SkippedChange {
        lineage_id: entry.lineage_id,
        reason,
        description: entry.description(),
    }
}

/// Plan the merge of `diff`'s source into its target.
pub fn plan_merge(diff: &BranchDiff) -> MergeResult<MergePlan> {
    let mut plan = MergePlan {
        total_changes: diff.total_changes(),
        ..MergePlan::default()
    };

    for entry in diff.entries() {
        match entry.kind {
            ChangeKind::Added => match &entry.target_tombstone {
                None => plan.actions.push(MergeAction::Create {
                    source: entry.source.clone(),
                }),
                Some(tombstone) => match divergence(&entry.source, tombstone)? {
                    Divergence::SourceChanged | Divergence::BothChanged => plan.conflicts.push(
                        conflict(entry, ConflictType::DeleteModify, "modified in source, deleted in target"),
                    ),
                    Divergence::TargetChanged | Divergence::Unchanged => {
                        plan.skipped.push(skip(entry, SkipReason::DeletedInTarget))
                    }
                },
            },
            ChangeKind::Modified => {
                let Some(target) = &entry.target else {
                    continue;
                };
                match divergence(&entry.source, target)? {
                    Divergence::SourceChanged => plan.actions.push(MergeAction::Update {
                        source: entry.source.clone(),
                        target: target.clone(),
                    }),
                    Divergence::TargetChanged => {
                        plan.skipped.push(skip(entry, SkipReason::TargetNewer))
                    }
                    Divergence::BothChanged => plan.conflicts.push(conflict(
                        entry,
                        ConflictType::ModifyModify,
                        "modified in both branches",
                    )),
                    Divergence::Unchanged => plan.skipped.push(skip(entry, SkipReason::NoChange)),
                }
            }
            ChangeKind::Deleted => {
                let Some(target) = &entry.target else {
                    continue;
                };
                match divergence(&entry.source, target)? {
                    Divergence::TargetChanged | Divergence::BothChanged => {
                        plan.conflicts.push(conflict(
                            entry,
                            ConflictType::DeleteModify,
                            "deleted in source, modified in target",
                        ))
                    }
                    Divergence::SourceChanged | Divergence::Unchanged => {
                        plan.actions.push(MergeAction::Delete {
                            source: entry.source.clone(),
                            target: target.clone(),
                        })
                    }
                }
            }
        }
    }

    tracing::debug!(
        actions = plan.actions.len(),
        conflicts = plan.conflicts.len(),
        skipped = plan.skipped.len(),
        "merge planned"
    );
    Ok(plan)
}
