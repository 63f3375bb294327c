//! Branch lifecycle management for scene branching.
//!
//! [`BranchManager`] is the entry point for applications: it creates, forks,
//! archives, deletes, diffs and merges branches, captures and restores
//! snapshots, and reports on background replication. Branch records commit
//! synchronously; element copies follow asynchronously and are eventually
//! consistent.

mod apply;
pub mod config;
pub mod error;
pub mod manager;
pub mod outcome;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use manager::BranchManager;
pub use outcome::{CreatedBranch, DeletedBranch, MergeOutcome, ReconciliationReport, ReplicationIssue};

// Re-export key types
pub use scene_diff::{DiffReport, ElementChange};
pub use scene_merge::{ConflictType, MergeConflict, SkipReason, SkippedChange};
pub use scene_snapshot::RestoreReport;
pub use scene_sync::{ComplianceReport, JobState, JobStatus, ListQuery, NewElement};
pub use scene_types::{Branch, BranchId, BranchStatus, Element, ElementId, JobId, SceneId, SnapshotId, SnapshotInfo};
