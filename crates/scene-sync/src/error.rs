use std::time::Duration;

use scene_store::StoreError;
use scene_types::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The peer service is disabled or unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("replication queue is full")]
    QueueFull,

    #[error("replication worker is stopped")]
    WorkerStopped,

    #[error("replication job not found: {0}")]
    JobNotFound(JobId),
}

impl SyncError {
    /// Returns `true` when the failure means "peer not reachable right now"
    /// rather than a problem with the request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout { .. } | Self::QueueFull | Self::WorkerStopped => {
                true
            }
            Self::Store(e) => matches!(e, StoreError::Unavailable(_)),
            Self::JobNotFound(_) => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
