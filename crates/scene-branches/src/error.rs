//! Error types for branch store operations.

use scene_types::{BranchId, SceneId, SnapshotId};
use thiserror::Error;

/// Errors that can occur during branch and snapshot operations.
#[derive(Debug, Error)]
pub enum BranchStoreError {
    /// The branch was not found.
    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    /// The snapshot was not found.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// A branch with this id already exists.
    #[error("branch already exists: {0}")]
    BranchExists(BranchId),

    /// A snapshot with this id already exists. Snapshots are write-once.
    #[error("snapshot already exists: {0}")]
    SnapshotExists(SnapshotId),

    /// The scene already has a main branch.
    #[error("scene {scene_id} already has a main branch: {existing}")]
    MainBranchExists { scene_id: SceneId, existing: BranchId },

    /// Another active branch in the scene uses this name.
    #[error("branch name already in use in scene {scene_id}: {name}")]
    NameTaken { scene_id: SceneId, name: String },

    /// Compare-and-swap failed: the stored branch version moved on.
    #[error("branch was modified by another process: {id} (expected version {expected}, found {actual})")]
    VersionConflict {
        id: BranchId,
        expected: u64,
        actual: u64,
    },

    /// The branch still has child branches and cannot be removed.
    #[error("branch {id} has {children} child branch(es)")]
    HasChildren { id: BranchId, children: usize },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// The snapshot name is invalid.
    #[error("invalid snapshot name: {name:?}: {reason}")]
    InvalidSnapshotName { name: String, reason: String },

    /// The record is malformed or violates a store invariant.
    #[error("invalid branch record: {0}")]
    Invalid(String),

    /// Storage backend is unavailable.
    #[error("branch store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for branch store operations.
pub type Result<T> = std::result::Result<T, BranchStoreError>;
