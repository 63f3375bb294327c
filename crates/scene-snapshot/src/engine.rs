use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scene_branches::BranchStore;
use scene_sync::{ElementReplicator, ListQuery, Provenance};
use scene_types::{BranchId, Snapshot, SnapshotId, SnapshotInfo};

use crate::codec::{decode_payload, encode_payload};
use crate::error::{SnapshotError, SnapshotResult};

/// Outcome of replaying a snapshot into its branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Snapshot rows written into the branch.
    pub restored: usize,
    /// Previously live rows soft-deleted.
    pub removed: usize,
    /// Rows that could not be written or deleted.
    pub failed: usize,
}

/// Captures and restores branch element sets.
pub struct SnapshotEngine {
    branches: Arc<dyn BranchStore>,
    replicator: Arc<ElementReplicator>,
}

impl SnapshotEngine {
    pub fn new(branches: Arc<dyn BranchStore>, replicator: Arc<ElementReplicator>) -> Self {
        Self {
            branches,
            replicator,
        }
    }

    /// Freeze the branch's live elements at its current version.
    pub async fn create_snapshot(
        &self,
        branch_id: BranchId,
        name: &str,
    ) -> SnapshotResult<Snapshot> {
        let branch = self.branches.get_branch(branch_id).await?;
        let cap = self.replicator.config().max_elements_per_fetch;
        let elements = self
            .replicator
            .service()
            .list_elements(branch_id, &ListQuery::live(cap))
            .await?;
        let payload = encode_payload(&elements)?;
        let count = elements.len() as u32;

        let snapshot = self
            .branches
            .create_snapshot(Snapshot::new(branch_id, name, branch.version, count, payload))
            .await?;
        info!(
            snapshot_id = %snapshot.id,
            branch_id = %branch_id,
            branch_version = branch.version,
            elements = count,
            "snapshot created"
        );
        Ok(snapshot)
    }

    pub async fn get_snapshot(&self, id: SnapshotId) -> SnapshotResult<Snapshot> {
        Ok(self.branches.get_snapshot(id).await?)
    }

    /// Snapshot metadata for a branch, newest first.
    pub async fn list_snapshots(&self, branch_id: BranchId) -> SnapshotResult<Vec<SnapshotInfo>> {
        self.branches.get_branch(branch_id).await?;
        let snapshots = self.branches.list_snapshots(branch_id).await?;
        Ok(snapshots.iter().map(Snapshot::info).collect())
    }

    /// Replace the branch's live elements with the snapshot's.
    ///
    /// Snapshot rows are written first, as new rows keeping their lineage
    /// and base fingerprint. The previous live set is soft-deleted only if
    /// every snapshot row was written; otherwise both sets stay live and the
    /// failure is reported. The branch version is advanced on success. The
    /// snapshot itself is never modified.
    pub async fn restore_snapshot(&self, id: SnapshotId) -> SnapshotResult<RestoreReport> {
        let snapshot = self.branches.get_snapshot(id).await?;
        if !snapshot.verify_checksum() {
            return Err(SnapshotError::ChecksumMismatch(id));
        }
        let rows = decode_payload(&snapshot.payload)?;

        let branch = self.branches.get_branch(snapshot.branch_id).await?;
        if !branch.is_active() {
            return Err(SnapshotError::BranchNotActive {
                id: branch.id,
                status: branch.status,
            });
        }

        let service = self.replicator.service();
        let cap = self.replicator.config().max_elements_per_fetch;
        let previous = service.list_elements(branch.id, &ListQuery::live(cap)).await?;

        let written = self
            .replicator
            .write_elements(branch.scene_id, branch.id, &rows, Provenance::Restore)
            .await;
        let mut report = RestoreReport {
            restored: written.copied,
            removed: 0,
            failed: written.failed,
        };
        if !written.is_complete() {
            warn!(
                snapshot_id = %id,
                branch_id = %branch.id,
                restored = written.copied,
                total = written.total,
                timed_out = written.timed_out,
                "restore incomplete, keeping previous elements"
            );
            return Ok(report);
        }

        for row in &previous {
            match service.delete_element(row.id).await {
                Ok(_) => report.removed += 1,
                Err(e) => {
                    warn!(element_id = %row.id, error = %e, "failed to remove element during restore");
                    report.failed += 1;
                }
            }
        }

        self.branches.bump_version(branch.id).await?;
        info!(
            snapshot_id = %id,
            branch_id = %branch.id,
            restored = report.restored,
            removed = report.removed,
            failed = report.failed,
            "snapshot restored"
        );
        Ok(report)
    }
}
