//! Results returned by [`BranchManager`](crate::BranchManager) operations.

use serde::{Deserialize, Serialize};

use scene_merge::{MergeConflict, SkippedChange};
use scene_sync::{ComplianceReport, JobState};
use scene_types::{Branch, BranchId, BranchStatus, JobId, SceneId};

/// A newly persisted branch and the replication job filling it, if one was
/// scheduled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBranch {
    pub branch: Branch,
    pub replication_job: Option<JobId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBranch {
    pub branch_id: BranchId,
    pub snapshots_removed: usize,
    /// Background purge of the branch's elements, if one was scheduled.
    pub purge_job: Option<JobId>,
}

/// Result of a merge attempt. Conflicts and compliance blocks are data, not
/// errors; `success` is `false` when either stopped the merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub source_branch_id: BranchId,
    pub target_branch_id: BranchId,
    pub success: bool,
    /// Actions applied to the target.
    pub changes_merged: usize,
    /// Actions that failed to apply.
    pub failed: usize,
    pub total_changes: usize,
    pub conflicts: Vec<MergeConflict>,
    pub skipped: Vec<SkippedChange>,
    pub compliance: ComplianceReport,
    /// Source branch status after the merge.
    pub source_status: BranchStatus,
}

impl MergeOutcome {
    pub(crate) fn blocked(source: &Branch, target: &Branch, compliance: ComplianceReport) -> Self {
        Self {
            source_branch_id: source.id,
            target_branch_id: target.id,
            success: false,
            changes_merged: 0,
            failed: 0,
            total_changes: 0,
            conflicts: Vec::new(),
            skipped: Vec::new(),
            compliance,
            source_status: source.status,
        }
    }

    /// Human-readable violation lines from the compliance check.
    pub fn compliance_violations(&self) -> Vec<String> {
        self.compliance.messages()
    }
}

/// A branch whose element copy did not finish cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationIssue {
    pub branch_id: BranchId,
    pub branch_name: String,
    pub job_id: JobId,
    pub state: JobState,
    /// Live elements in the branch now; `None` if the count was unavailable.
    pub live_elements: Option<usize>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub scene_id: SceneId,
    pub branches_checked: usize,
    pub jobs_checked: usize,
    pub issues: Vec<ReplicationIssue>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}
