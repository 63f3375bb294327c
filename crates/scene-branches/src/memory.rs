//! In-memory branch store for testing and embedding.
//!
//! [`InMemoryBranchStore`] keeps branches and snapshots in `HashMap`s
//! protected by `RwLock`s. It implements the full [`BranchStore`] trait and
//! checks the per-scene invariants under the write lock, so concurrent
//! creates cannot produce two main branches.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use scene_types::{Branch, BranchId, BranchStatus, SceneId, Snapshot, SnapshotId};

use crate::error::{BranchStoreError, Result};
use crate::names::{validate_branch_name, validate_snapshot_name};
use crate::traits::BranchStore;

/// An in-memory implementation of [`BranchStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBranchStore {
    branches: RwLock<HashMap<BranchId, Branch>>,
    snapshots: RwLock<HashMap<SnapshotId, Snapshot>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> BranchStoreError {
    BranchStoreError::Unavailable(format!("lock poisoned: {e}"))
}

fn newest_first(mut branches: Vec<Branch>) -> Vec<Branch> {
    branches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    branches
}

impl InMemoryBranchStore {
    /// Create a new empty branch store.
    pub fn new() -> Self {
        Self::default()
    }

    fn branches_read(&self) -> Result<RwLockReadGuard<'_, HashMap<BranchId, Branch>>> {
        self.branches.read().map_err(poisoned)
    }

    fn branches_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<BranchId, Branch>>> {
        self.branches.write().map_err(poisoned)
    }

    fn snapshots_read(&self) -> Result<RwLockReadGuard<'_, HashMap<SnapshotId, Snapshot>>> {
        self.snapshots.read().map_err(poisoned)
    }

    fn snapshots_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SnapshotId, Snapshot>>> {
        self.snapshots.write().map_err(poisoned)
    }

    fn check_name_free(
        branches: &HashMap<BranchId, Branch>,
        candidate: &Branch,
    ) -> Result<()> {
        let taken = branches.values().any(|b| {
            b.id != candidate.id
                && b.scene_id == candidate.scene_id
                && b.status == BranchStatus::Active
                && b.name == candidate.name
        });
        if taken {
            return Err(BranchStoreError::NameTaken {
                scene_id: candidate.scene_id,
                name: candidate.name.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BranchStore for InMemoryBranchStore {
    async fn create_branch(&self, branch: Branch) -> Result<Branch> {
        validate_branch_name(&branch.name)?;
        if branch.is_main != branch.parent_branch_id.is_none() {
            return Err(BranchStoreError::Invalid(
                "a branch is main exactly when it has no parent".into(),
            ));
        }

        let mut branches = self.branches_write()?;
        if branches.contains_key(&branch.id) {
            return Err(BranchStoreError::BranchExists(branch.id));
        }
        if branch.is_main {
            if let Some(existing) = branches
                .values()
                .find(|b| b.scene_id == branch.scene_id && b.is_main)
            {
                return Err(BranchStoreError::MainBranchExists {
                    scene_id: branch.scene_id,
                    existing: existing.id,
                });
            }
        }
        if let Some(parent_id) = branch.parent_branch_id {
            match branches.get(&parent_id) {
                Some(parent) if parent.scene_id == branch.scene_id => {}
                Some(_) => {
                    return Err(BranchStoreError::Invalid(format!(
                        "parent {parent_id} belongs to another scene"
                    )))
                }
                None => return Err(BranchStoreError::BranchNotFound(parent_id)),
            }
        }
        if branch.status == BranchStatus::Active {
            Self::check_name_free(&branches, &branch)?;
        }

        branches.insert(branch.id, branch.clone());
        tracing::debug!(branch_id = %branch.id, scene_id = %branch.scene_id, name = %branch.name, "branch stored");
        Ok(branch)
    }

    async fn find_branch(&self, id: BranchId) -> Result<Option<Branch>> {
        let branches = self.branches_read()?;
        Ok(branches.get(&id).cloned())
    }

    async fn update_branch(&self, mut branch: Branch) -> Result<Branch> {
        let mut branches = self.branches_write()?;
        let stored = branches
            .get(&branch.id)
            .ok_or(BranchStoreError::BranchNotFound(branch.id))?;
        if stored.version != branch.version {
            return Err(BranchStoreError::VersionConflict {
                id: branch.id,
                expected: branch.version,
                actual: stored.version,
            });
        }
        if stored.scene_id != branch.scene_id
            || stored.parent_branch_id != branch.parent_branch_id
            || stored.is_main != branch.is_main
        {
            return Err(BranchStoreError::Invalid(format!(
                "branch {} cannot change scene, parent or main flag",
                branch.id
            )));
        }
        if stored.status != branch.status && !stored.status.can_transition_to(branch.status) {
            return Err(BranchStoreError::Invalid(format!(
                "branch {} cannot move from {} to {}",
                branch.id, stored.status, branch.status
            )));
        }
        if branch.is_main && branch.status != BranchStatus::Active {
            return Err(BranchStoreError::Invalid(
                "the main branch must stay ACTIVE".into(),
            ));
        }
        if stored.name != branch.name {
            validate_branch_name(&branch.name)?;
        }
        if branch.status == BranchStatus::Active {
            Self::check_name_free(&branches, &branch)?;
        }

        branch.created_at = stored.created_at;
        branch.touch();
        branches.insert(branch.id, branch.clone());
        Ok(branch)
    }

    async fn delete_branch(&self, id: BranchId) -> Result<bool> {
        let mut branches = self.branches_write()?;
        // Same lock as the parent check in create_branch, so a concurrent
        // fork either lands first and blocks this delete or sees no parent.
        let children = branches
            .values()
            .filter(|b| b.parent_branch_id == Some(id))
            .count();
        if children > 0 {
            return Err(BranchStoreError::HasChildren { id, children });
        }
        Ok(branches.remove(&id).is_some())
    }

    async fn list_by_scene(&self, scene_id: SceneId) -> Result<Vec<Branch>> {
        let branches = self.branches_read()?;
        Ok(newest_first(
            branches
                .values()
                .filter(|b| b.scene_id == scene_id)
                .cloned()
                .collect(),
        ))
    }

    async fn main_branch(&self, scene_id: SceneId) -> Result<Option<Branch>> {
        let branches = self.branches_read()?;
        Ok(branches
            .values()
            .find(|b| b.scene_id == scene_id && b.is_main)
            .cloned())
    }

    async fn children(&self, id: BranchId) -> Result<Vec<Branch>> {
        let branches = self.branches_read()?;
        Ok(newest_first(
            branches
                .values()
                .filter(|b| b.parent_branch_id == Some(id))
                .cloned()
                .collect(),
        ))
    }

    async fn create_snapshot(&self, mut snapshot: Snapshot) -> Result<Snapshot> {
        validate_snapshot_name(&snapshot.name)?;
        if !self.branches_read()?.contains_key(&snapshot.branch_id) {
            return Err(BranchStoreError::BranchNotFound(snapshot.branch_id));
        }
        let mut snapshots = self.snapshots_write()?;
        if snapshots.contains_key(&snapshot.id) {
            return Err(BranchStoreError::SnapshotExists(snapshot.id));
        }
        snapshot.created_at = Utc::now();
        snapshots.insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn find_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots_read()?;
        Ok(snapshots.get(&id).cloned())
    }

    async fn list_snapshots(&self, branch_id: BranchId) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots_read()?;
        let mut result: Vec<Snapshot> = snapshots
            .values()
            .filter(|s| s.branch_id == branch_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    async fn delete_snapshots_for_branch(&self, branch_id: BranchId) -> Result<usize> {
        let mut snapshots = self.snapshots_write()?;
        let before = snapshots.len();
        snapshots.retain(|_, s| s.branch_id != branch_id);
        Ok(before - snapshots.len())
    }
}
