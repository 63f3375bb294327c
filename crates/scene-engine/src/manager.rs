use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scene_branches::BranchStore;
use scene_diff::{diff_elements, DiffReport};
use scene_merge::plan_merge;
use scene_snapshot::{RestoreReport, SnapshotEngine};
use scene_sync::{
    ComplianceChecker, ComplianceReport, ElementReplicator, ElementService, JobKind, JobOutcome,
    JobState, JobStatus, ListQuery, NewElement, ReplicationWorker,
};
use scene_types::{
    Branch, BranchId, BranchStatus, Element, ElementId, JobId, SceneId, SnapshotId, SnapshotInfo,
};

use crate::apply::apply_plan;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::outcome::{
    CreatedBranch, DeletedBranch, MergeOutcome, ReconciliationReport, ReplicationIssue,
};

/// Top-level orchestrator for a scene's branch tree.
///
/// Holds no authoritative state: branches and snapshots live in the branch
/// store, elements behind the element service.
pub struct BranchManager {
    branches: Arc<dyn BranchStore>,
    elements: Arc<dyn ElementService>,
    compliance: Arc<dyn ComplianceChecker>,
    replicator: Arc<ElementReplicator>,
    worker: Arc<ReplicationWorker>,
    snapshots: SnapshotEngine,
    config: EngineConfig,
}

impl BranchManager {
    pub fn new(
        branches: Arc<dyn BranchStore>,
        replicator: Arc<ElementReplicator>,
        worker: Arc<ReplicationWorker>,
        compliance: Arc<dyn ComplianceChecker>,
        config: EngineConfig,
    ) -> Self {
        let elements = replicator.service().clone();
        let snapshots = SnapshotEngine::new(branches.clone(), replicator.clone());
        Self {
            branches,
            elements,
            compliance,
            replicator,
            worker,
            snapshots,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Branch lifecycle ----

    /// Persist a branch, then schedule the copy of its parent's elements.
    ///
    /// Without a parent the branch is the scene's main branch. The copy runs
    /// on the replication worker and is not awaited; the returned job id is
    /// the completion signal. Branch creation succeeds even when the element
    /// service is unreachable or the worker refuses the job.
    pub async fn create_branch(
        &self,
        scene_id: SceneId,
        name: &str,
        description: &str,
        parent_id: Option<BranchId>,
    ) -> EngineResult<CreatedBranch> {
        match self.elements.get_scene(scene_id).await {
            Ok(_) => {}
            Err(e) if e.is_unavailable() => {
                warn!(scene_id = %scene_id, error = %e, "cannot verify scene, element service unavailable");
            }
            Err(e) => return Err(e.into()),
        }

        let Some(parent_id) = parent_id else {
            let branch = self
                .branches
                .create_branch(Branch::main(scene_id, name, description))
                .await?;
            info!(scene_id = %scene_id, branch_id = %branch.id, name = %branch.name, "main branch created");
            return Ok(CreatedBranch {
                branch,
                replication_job: None,
            });
        };

        let parent = self.branches.get_branch(parent_id).await?;
        if parent.scene_id != scene_id {
            return Err(EngineError::invalid(format!(
                "parent branch {parent_id} belongs to another scene"
            )));
        }
        if !parent.is_active() {
            return Err(EngineError::invalid(format!(
                "parent branch {parent_id} is {}, only ACTIVE branches can be forked",
                parent.status
            )));
        }

        let branch = self
            .branches
            .create_branch(Branch::fork(scene_id, parent_id, name, description))
            .await?;
        info!(
            scene_id = %scene_id,
            branch_id = %branch.id,
            parent_id = %parent_id,
            name = %branch.name,
            "branch created"
        );

        let replication_job = match self.worker.submit(JobKind::Replicate {
            scene_id,
            source: parent_id,
            target: branch.id,
        }) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(branch_id = %branch.id, error = %e, "replication not scheduled, branch starts empty");
                None
            }
        };
        Ok(CreatedBranch {
            branch,
            replication_job,
        })
    }

    pub async fn get_branch(&self, id: BranchId) -> EngineResult<Branch> {
        Ok(self.branches.get_branch(id).await?)
    }

    /// All branches of a scene, newest first.
    pub async fn list_branches(&self, scene_id: SceneId) -> EngineResult<Vec<Branch>> {
        Ok(self.branches.list_by_scene(scene_id).await?)
    }

    pub async fn get_main_branch(&self, scene_id: SceneId) -> EngineResult<Branch> {
        self.branches
            .main_branch(scene_id)
            .await?
            .ok_or_else(|| EngineError::not_found("main branch of scene", scene_id))
    }

    pub async fn archive_branch(&self, id: BranchId) -> EngineResult<Branch> {
        let mut branch = self.branches.get_branch(id).await?;
        if branch.is_main {
            return Err(EngineError::invalid("the main branch cannot be archived"));
        }
        if !branch.is_active() {
            return Err(EngineError::invalid(format!(
                "branch {id} is {}, only ACTIVE branches can be archived",
                branch.status
            )));
        }
        branch.status = BranchStatus::Archived;
        let branch = self.branches.update_branch(branch).await?;
        info!(branch_id = %id, "branch archived");
        Ok(branch)
    }

    /// Remove a branch record and its snapshots, then schedule the purge of
    /// its elements.
    pub async fn delete_branch(&self, id: BranchId) -> EngineResult<DeletedBranch> {
        let branch = self.branches.get_branch(id).await?;
        if branch.is_main {
            return Err(EngineError::invalid("the main branch cannot be deleted"));
        }
        let children = self.branches.children(id).await?;
        if !children.is_empty() {
            return Err(EngineError::invalid(format!(
                "branch {id} still has {} child branch(es)",
                children.len()
            )));
        }

        // The store re-checks for children under its own lock; the check
        // above only saves the round trip in the common case.
        if !self.branches.delete_branch(id).await? {
            return Err(EngineError::not_found("branch", id));
        }
        let snapshots_removed = self.branches.delete_snapshots_for_branch(id).await?;
        info!(branch_id = %id, snapshots_removed, "branch deleted");

        let purge_job = if self.config.purge_elements_on_delete {
            match self.worker.submit(JobKind::Purge { branch_id: id }) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!(branch_id = %id, error = %e, "element purge not scheduled");
                    None
                }
            }
        } else {
            None
        };
        Ok(DeletedBranch {
            branch_id: id,
            snapshots_removed,
            purge_job,
        })
    }

    // ---- Diff and merge ----

    /// Read-only comparison of `source` against `target`.
    pub async fn get_diff(&self, source_id: BranchId, target_id: BranchId) -> EngineResult<DiffReport> {
        let (source, target) = self.branch_pair(source_id, target_id).await?;
        let (source_rows, target_rows) = self
            .replicator
            .get_elements_for_merge(source.id, target.id)
            .await?;
        let diff = diff_elements(&source_rows, &target_rows);
        Ok(DiffReport::from_diff(source.id, target.id, &diff))
    }

    /// Merge `source` into `target`.
    ///
    /// A blocking compliance report or any conflict stops the merge before
    /// the target is touched. Otherwise every planned action is applied
    /// with its own compare-and-swap, the target version is advanced, and
    /// with `delete_source` the source moves to `MERGED`.
    ///
    /// Merged pairs are re-anchored on both sides, which writes the source
    /// rows too: their versions advance even though their content does not
    /// change. Clients holding a source element from before the merge must
    /// re-read it before updating.
    pub async fn merge_branch(
        &self,
        source_id: BranchId,
        target_id: BranchId,
        delete_source: bool,
    ) -> EngineResult<MergeOutcome> {
        let (source, target) = self.branch_pair(source_id, target_id).await?;
        for branch in [&source, &target] {
            if !branch.is_active() {
                return Err(EngineError::invalid(format!(
                    "branch {} is {}, only ACTIVE branches can be merged",
                    branch.id, branch.status
                )));
            }
        }
        if delete_source && source.is_main {
            return Err(EngineError::invalid("the main branch cannot be merged away"));
        }

        let compliance = match self.compliance.check(source.scene_id, source.id).await {
            Ok(report) => report,
            Err(e) => {
                warn!(branch_id = %source.id, error = %e, "compliance check unavailable, merging without it");
                ComplianceReport::skipped()
            }
        };
        if !compliance.is_compliant() && self.config.enforce_compliance {
            warn!(
                source_branch = %source.id,
                violations = compliance.violations.len(),
                "merge blocked by compliance violations"
            );
            return Ok(MergeOutcome::blocked(&source, &target, compliance));
        }

        let (source_rows, target_rows) = self
            .replicator
            .get_elements_for_merge(source.id, target.id)
            .await?;
        let diff = diff_elements(&source_rows, &target_rows);
        let plan = plan_merge(&diff)?;

        let mut outcome = MergeOutcome {
            source_branch_id: source.id,
            target_branch_id: target.id,
            success: plan.is_clean(),
            changes_merged: 0,
            failed: 0,
            total_changes: plan.total_changes,
            conflicts: plan.conflicts.clone(),
            skipped: plan.skipped.clone(),
            compliance,
            source_status: source.status,
        };
        if !plan.is_clean() {
            info!(
                source_branch = %source.id,
                target_branch = %target.id,
                conflicts = outcome.conflicts.len(),
                "merge stopped by conflicts"
            );
            return Ok(outcome);
        }

        let applied = apply_plan(self.elements.as_ref(), &target, &source_rows, &target_rows, plan).await;
        outcome.changes_merged = applied.applied;
        outcome.failed = applied.failed;

        if applied.applied > 0 {
            self.branches.bump_version(target.id).await?;
        }
        if delete_source {
            let mut current = self.branches.get_branch(source.id).await?;
            current.status = BranchStatus::Merged;
            let merged = self.branches.update_branch(current).await?;
            outcome.source_status = merged.status;
        }

        info!(
            source_branch = %source.id,
            target_branch = %target.id,
            merged = outcome.changes_merged,
            failed = outcome.failed,
            skipped = outcome.skipped.len(),
            "merge applied"
        );
        Ok(outcome)
    }

    async fn branch_pair(&self, source_id: BranchId, target_id: BranchId) -> EngineResult<(Branch, Branch)> {
        if source_id == target_id {
            return Err(EngineError::invalid("source and target must be different branches"));
        }
        let source = self.branches.get_branch(source_id).await?;
        let target = self.branches.get_branch(target_id).await?;
        if source.scene_id != target.scene_id {
            return Err(EngineError::invalid("branches belong to different scenes"));
        }
        Ok((source, target))
    }

    // ---- Snapshots ----

    pub async fn create_snapshot(&self, branch_id: BranchId, name: &str) -> EngineResult<SnapshotInfo> {
        Ok(self.snapshots.create_snapshot(branch_id, name).await?.info())
    }

    pub async fn get_snapshot(&self, id: SnapshotId) -> EngineResult<SnapshotInfo> {
        Ok(self.snapshots.get_snapshot(id).await?.info())
    }

    /// Snapshots of a branch, newest first.
    pub async fn list_snapshots(&self, branch_id: BranchId) -> EngineResult<Vec<SnapshotInfo>> {
        Ok(self.snapshots.list_snapshots(branch_id).await?)
    }

    pub async fn restore_snapshot(&self, id: SnapshotId) -> EngineResult<RestoreReport> {
        Ok(self.snapshots.restore_snapshot(id).await?)
    }

    // ---- Replication ----

    pub fn replication_status(&self, job: JobId) -> EngineResult<JobStatus> {
        Ok(self.worker.status(job)?)
    }

    /// Wait for a job to finish, up to `timeout`. Returns the latest status
    /// either way.
    pub async fn wait_for_replication(&self, job: JobId, timeout: Duration) -> EngineResult<JobStatus> {
        Ok(self.worker.wait(job, timeout).await?)
    }

    /// Report every branch of the scene whose element copy did not finish
    /// cleanly. Reports only; nothing is re-copied.
    pub async fn reconcile(&self, scene_id: SceneId) -> EngineResult<ReconciliationReport> {
        let branches = self.branches.list_by_scene(scene_id).await?;
        let ids: Vec<BranchId> = branches.iter().map(|b| b.id).collect();
        let jobs = self.worker.jobs_for_branches(&ids)?;

        let mut report = ReconciliationReport {
            scene_id,
            branches_checked: branches.len(),
            jobs_checked: 0,
            issues: Vec::new(),
        };
        for job in jobs {
            let JobKind::Replicate { target, .. } = job.job else {
                continue;
            };
            report.jobs_checked += 1;
            let reason = match &job.state {
                JobState::Completed(JobOutcome::Replicated(r)) if !r.is_complete() => format!(
                    "copied {} of {} elements ({} failed{})",
                    r.copied,
                    r.total,
                    r.failed,
                    if r.timed_out { ", timed out" } else { "" }
                ),
                JobState::Failed(reason) => format!("replication failed: {reason}"),
                JobState::Cancelled => "replication cancelled".to_string(),
                _ => continue,
            };
            let branch_name = branches
                .iter()
                .find(|b| b.id == target)
                .map(|b| b.name.clone())
                .unwrap_or_default();
            let live_elements = match self.elements.count_elements(target).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(branch_id = %target, error = %e, "cannot count branch elements");
                    None
                }
            };
            report.issues.push(ReplicationIssue {
                branch_id: target,
                branch_name,
                job_id: job.id,
                state: job.state.clone(),
                live_elements,
                reason,
            });
        }

        if !report.is_consistent() {
            warn!(scene_id = %scene_id, issues = report.issues.len(), "scene has incomplete replication");
        }
        Ok(report)
    }

    // ---- Elements ----

    /// Create an element directly in an `ACTIVE` branch.
    pub async fn create_element(&self, branch_id: BranchId, mut element: NewElement) -> EngineResult<Element> {
        let branch = self.active_branch(branch_id).await?;
        element.scene_id = branch.scene_id;
        element.branch_id = branch.id;
        Ok(self.elements.create_element(element).await?)
    }

    pub async fn list_elements(&self, branch_id: BranchId, query: &ListQuery) -> EngineResult<Vec<Element>> {
        self.branches.get_branch(branch_id).await?;
        Ok(self.elements.list_elements(branch_id, query).await?)
    }

    /// An element by id, tombstones included.
    pub async fn get_element(&self, id: ElementId) -> EngineResult<Element> {
        Ok(self.elements.get_element(id).await?)
    }

    /// Compare-and-swap update; `element.version` is the version the caller
    /// read. Deleted rows and the base fingerprint cannot be changed here.
    pub async fn update_element(&self, element: Element) -> EngineResult<Element> {
        self.active_branch(element.branch_id).await?;
        Ok(self.elements.update_element(element).await?)
    }

    /// Soft-delete an element of an `ACTIVE` branch.
    pub async fn delete_element(&self, id: ElementId) -> EngineResult<Element> {
        let element = self.elements.get_element(id).await?;
        self.active_branch(element.branch_id).await?;
        Ok(self.elements.delete_element(id).await?)
    }

    async fn active_branch(&self, id: BranchId) -> EngineResult<Branch> {
        let branch = self.branches.get_branch(id).await?;
        if !branch.is_active() {
            return Err(EngineError::invalid(format!(
                "branch {id} is {}, elements can only change in ACTIVE branches",
                branch.status
            )));
        }
        Ok(branch)
    }

    /// Stop the replication worker, cancelling unfinished jobs.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}
