use serde::{Deserialize, Serialize};

use scene_types::{BranchId, ElementField, ElementId, ElementType, LineageId};

use crate::branch_diff::{BranchDiff, DiffEntry};

/// One changed element, as reported to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementChange {
    pub lineage_id: LineageId,
    pub source_element_id: ElementId,
    pub target_element_id: Option<ElementId>,
    pub element_type: ElementType,
    pub description: String,
    #[serde(default)]
    pub changed_fields: Vec<ElementField>,
}

impl From<&DiffEntry> for ElementChange {
    fn from(entry: &DiffEntry) -> Self {
        Self {
            lineage_id: entry.lineage_id,
            source_element_id: entry.source.id,
            target_element_id: entry.target.as_ref().map(|t| t.id),
            element_type: entry.element_type(),
            description: entry.description(),
            changed_fields: entry.changed_fields.clone(),
        }
    }
}

/// Summary of a source-versus-target comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub source_branch_id: BranchId,
    pub target_branch_id: BranchId,
    pub added: Vec<ElementChange>,
    pub modified: Vec<ElementChange>,
    pub deleted: Vec<ElementChange>,
    pub total_changes: usize,
}

impl DiffReport {
    pub fn from_diff(source: BranchId, target: BranchId, diff: &BranchDiff) -> Self {
        Self {
            source_branch_id: source,
            target_branch_id: target,
            added: diff.added.iter().map(ElementChange::from).collect(),
            modified: diff.modified.iter().map(ElementChange::from).collect(),
            deleted: diff.deleted.iter().map(ElementChange::from).collect(),
            total_changes: diff.total_changes(),
        }
    }
}
