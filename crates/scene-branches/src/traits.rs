//! The [`BranchStore`] trait defining the branch storage interface.
//!
//! Any backend (in-memory, document database) implements this trait to own
//! branch and snapshot records.

use async_trait::async_trait;

use scene_types::{Branch, BranchId, SceneId, Snapshot, SnapshotId};

use crate::error::{BranchStoreError, Result};

/// Storage backend for branch and snapshot records.
///
/// Implementations must be thread-safe (`Send + Sync`) and keep these
/// invariants under concurrent use:
///
/// - at most one branch per scene has `is_main = true`;
/// - branch names are valid and unique among a scene's `ACTIVE` branches;
/// - `update_branch` is a compare-and-swap on the branch version, and the
///   stored version advances by one;
/// - snapshots are write-once.
#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Persist a new branch.
    async fn create_branch(&self, branch: Branch) -> Result<Branch>;

    /// Read a branch by id. Returns `Ok(None)` if it does not exist.
    async fn find_branch(&self, id: BranchId) -> Result<Option<Branch>>;

    /// Compare-and-swap update. `branch.version` must equal the stored
    /// version. Scene, parent and main flag are immutable.
    async fn update_branch(&self, branch: Branch) -> Result<Branch>;

    /// Remove a branch record. Returns `true` if it existed. Fails with
    /// `HasChildren` while any branch names it as parent; the check and the
    /// removal are atomic with respect to `create_branch`.
    async fn delete_branch(&self, id: BranchId) -> Result<bool>;

    /// All branches of a scene, newest first.
    async fn list_by_scene(&self, scene_id: SceneId) -> Result<Vec<Branch>>;

    /// The scene's main branch, if one was created.
    async fn main_branch(&self, scene_id: SceneId) -> Result<Option<Branch>>;

    /// Branches whose parent is `id`, newest first.
    async fn children(&self, id: BranchId) -> Result<Vec<Branch>>;

    /// Persist a new snapshot. Fails if the id is already taken.
    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Snapshot>;

    /// Read a snapshot by id. Returns `Ok(None)` if it does not exist.
    async fn find_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>>;

    /// Snapshots of a branch, newest first.
    async fn list_snapshots(&self, branch_id: BranchId) -> Result<Vec<Snapshot>>;

    /// Remove every snapshot of a branch. Returns how many were removed.
    async fn delete_snapshots_for_branch(&self, branch_id: BranchId) -> Result<usize>;

    /// Read a branch, failing with `BranchNotFound` if absent.
    async fn get_branch(&self, id: BranchId) -> Result<Branch> {
        self.find_branch(id)
            .await?
            .ok_or(BranchStoreError::BranchNotFound(id))
    }

    /// Advance a branch's version by one without changing anything else.
    ///
    /// Re-reads and retries when a concurrent writer wins the
    /// compare-and-swap, up to three attempts.
    async fn bump_version(&self, id: BranchId) -> Result<Branch> {
        let mut attempt = 0;
        loop {
            let current = self.get_branch(id).await?;
            match self.update_branch(current).await {
                Err(BranchStoreError::VersionConflict { .. }) if attempt < 2 => attempt += 1,
                other => return other,
            }
        }
    }

    /// Read a snapshot, failing with `SnapshotNotFound` if absent.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot> {
        self.find_snapshot(id)
            .await?
            .ok_or(BranchStoreError::SnapshotNotFound(id))
    }
}
