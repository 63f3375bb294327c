use serde::{Deserialize, Serialize};

use scene_types::{ElementField, ElementId, ElementType, LineageId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides modified the same element since their common ancestor.
    ModifyModify,
    /// One side deleted the element, the other modified it.
    DeleteModify,
}

/// An element the merge cannot resolve automatically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub conflict_type: ConflictType,
    pub lineage_id: LineageId,
    pub element_type: ElementType,
    pub source_element_id: ElementId,
    pub target_element_id: Option<ElementId>,
    /// Fields that differ between the two sides.
    #[serde(default)]
    pub changed_fields: Vec<ElementField>,
    pub description: String,
}
