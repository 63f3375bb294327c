//! Per-lineage view of a branch.
//!
//! A branch normally holds one row per lineage. Restores and retried copies
//! can leave more: several tombstones, or more than one live row. The index
//! collapses each lineage to its newest live row and its newest tombstone.

use std::collections::BTreeMap;

use scene_types::{Element, LineageId};

/// The rows of one lineage inside one branch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineageSlot {
    pub live: Option<Element>,
    pub tombstone: Option<Element>,
}

/// Branch rows keyed by lineage.
#[derive(Clone, Debug, Default)]
pub struct LineageIndex {
    slots: BTreeMap<LineageId, LineageSlot>,
    duplicates: usize,
}

fn newer(candidate: &Element, current: &Element) -> bool {
    (candidate.updated_at, candidate.id) > (current.updated_at, current.id)
}

impl LineageIndex {
    /// Build an index from a branch's rows, tombstones included.
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a Element>) -> Self {
        let mut index = Self::default();
        for row in rows {
            let slot = index.slots.entry(row.lineage_id).or_default();
            let target = if row.is_deleted {
                &mut slot.tombstone
            } else {
                &mut slot.live
            };
            if let Some(current) = target.as_mut() {
                if row.is_live() {
                    index.duplicates += 1;
                }
                if newer(row, current) {
                    *current = row.clone();
                }
            } else {
                *target = Some(row.clone());
            }
        }
        index
    }

    pub fn get(&self, lineage: &LineageId) -> Option<&LineageSlot> {
        self.slots.get(lineage)
    }

    pub fn live(&self, lineage: &LineageId) -> Option<&Element> {
        self.slots.get(lineage).and_then(|s| s.live.as_ref())
    }

    pub fn tombstone(&self, lineage: &LineageId) -> Option<&Element> {
        self.slots.get(lineage).and_then(|s| s.tombstone.as_ref())
    }

    /// Iterate lineages in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&LineageId, &LineageSlot)> {
        self.slots.iter()
    }

    /// Number of live rows that shadowed another live row of the same lineage.
    pub fn duplicate_live_rows(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
