//! Branch-level diff: compare the element sets of a source and a target.
//!
//! Rows are paired by lineage. For each lineage:
//!
//! - live in source, not live in target: `Added`
//! - live in both, content differs: `Modified`
//! - live in target, tombstoned in source: `Deleted`
//!
//! A lineage live only in target with no source row at all is target's own
//! addition and is not a change from source's point of view.

use serde::{Deserialize, Serialize};

use scene_types::{Element, ElementField, ElementType, LineageId};

use crate::lineage::LineageIndex;

/// Direction-free classification of a diff entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One lineage that differs between source and target.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffEntry {
    pub kind: ChangeKind,
    pub lineage_id: LineageId,
    /// Source row: live for `Added`/`Modified`, the tombstone for `Deleted`.
    pub source: Element,
    /// Live target row for `Modified`/`Deleted`.
    pub target: Option<Element>,
    /// Target tombstone of the same lineage, if target deleted it earlier.
    pub target_tombstone: Option<Element>,
    /// Content fields that differ. Empty for `Added`/`Deleted`.
    pub changed_fields: Vec<ElementField>,
}

impl DiffEntry {
    pub fn element_type(&self) -> ElementType {
        match (&self.kind, &self.target) {
            (ChangeKind::Deleted, Some(target)) => target.element_type,
            _ => self.source.element_type,
        }
    }

    /// Human-readable one-liner.
    pub fn description(&self) -> String {
        match self.kind {
            ChangeKind::Added => format!(
                "{} '{}' added",
                self.source.element_type, self.source.name
            ),
            ChangeKind::Deleted => {
                let row = self.target.as_ref().unwrap_or(&self.source);
                format!("{} '{}' deleted", row.element_type, row.name)
            }
            ChangeKind::Modified => {
                let fields: Vec<String> =
                    self.changed_fields.iter().map(|f| f.to_string()).collect();
                format!(
                    "{} '{}' modified: {}",
                    self.source.element_type,
                    self.source.name,
                    fields.join(", ")
                )
            }
        }
    }
}

/// Result of comparing a source branch against a target branch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BranchDiff {
    pub added: Vec<DiffEntry>,
    pub modified: Vec<DiffEntry>,
    pub deleted: Vec<DiffEntry>,
}

impl BranchDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// `|Added| + |Modified| + |Deleted|`.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    /// All entries: added, then modified, then deleted.
    pub fn entries(&self) -> impl Iterator<Item = &DiffEntry> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .chain(self.deleted.iter())
    }
}

/// Compute the diff between `source` and `target` element sets.
///
/// Both slices should include tombstones: without them deletions in source
/// cannot be told apart from additions in target.
pub fn diff_elements(source: &[Element], target: &[Element]) -> BranchDiff {
    let source_index = LineageIndex::build(source);
    let target_index = LineageIndex::build(target);
    let mut diff = BranchDiff::new();

    for (lineage, slot) in source_index.iter() {
        let target_slot = target_index.get(lineage);
        let target_live = target_slot.and_then(|s| s.live.as_ref());
        let target_tombstone = target_slot.and_then(|s| s.tombstone.clone());

        match (&slot.live, target_live) {
            (Some(src), None) => diff.added.push(DiffEntry {
                kind: ChangeKind::Added,
                lineage_id: *lineage,
                source: src.clone(),
                target: None,
                target_tombstone,
                changed_fields: Vec::new(),
            }),
            (Some(src), Some(tgt)) => {
                let changed_fields = tgt.changed_fields(src);
                if !changed_fields.is_empty() {
                    diff.modified.push(DiffEntry {
                        kind: ChangeKind::Modified,
                        lineage_id: *lineage,
                        source: src.clone(),
                        target: Some(tgt.clone()),
                        target_tombstone,
                        changed_fields,
                    });
                }
            }
            (None, Some(tgt)) => {
                if let Some(tomb) = &slot.tombstone {
                    diff.deleted.push(DiffEntry {
                        kind: ChangeKind::Deleted,
                        lineage_id: *lineage,
                        source: tomb.clone(),
                        target: Some(tgt.clone()),
                        target_tombstone,
                        changed_fields: Vec::new(),
                    });
                }
            }
            (None, None) => {}
        }
    }

    diff
}
