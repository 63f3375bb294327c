use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scene_branches::BranchStoreError;
use scene_merge::MergeError;
use scene_snapshot::SnapshotError;
use scene_store::StoreError;
use scene_sync::SyncError;
use scene_types::TypeError;

/// The five error kinds every engine failure collapses to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<BranchStoreError> for EngineError {
    fn from(err: BranchStoreError) -> Self {
        match err {
            BranchStoreError::BranchNotFound(id) => Self::not_found("branch", id),
            BranchStoreError::SnapshotNotFound(id) => Self::not_found("snapshot", id),
            BranchStoreError::MainBranchExists { .. }
            | BranchStoreError::HasChildren { .. }
            | BranchStoreError::InvalidBranchName { .. }
            | BranchStoreError::InvalidSnapshotName { .. }
            | BranchStoreError::Invalid(_) => Self::InvalidArgument(err.to_string()),
            BranchStoreError::BranchExists(_)
            | BranchStoreError::SnapshotExists(_)
            | BranchStoreError::NameTaken { .. }
            | BranchStoreError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            BranchStoreError::Unavailable(_) => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ElementNotFound(id) => Self::not_found("element", id),
            StoreError::SceneNotFound(id) => Self::not_found("scene", id),
            StoreError::AlreadyExists(_) | StoreError::VersionConflict { .. } => {
                Self::Conflict(err.to_string())
            }
            StoreError::Invalid(_) => Self::InvalidArgument(err.to_string()),
            StoreError::Type(_) => Self::Internal(err.to_string()),
            StoreError::Unavailable(_) => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<SyncError> for EngineError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Store(e) => e.into(),
            SyncError::JobNotFound(id) => Self::not_found("job", id),
            SyncError::Unavailable(_)
            | SyncError::Timeout { .. }
            | SyncError::QueueFull
            | SyncError::WorkerStopped => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<SnapshotError> for EngineError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Branches(e) => e.into(),
            SnapshotError::Sync(e) => e.into(),
            SnapshotError::BranchNotActive { .. } | SnapshotError::TooManyElements(_) => {
                Self::InvalidArgument(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MergeError> for EngineError {
    fn from(err: MergeError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::Serialization(_) => Self::Internal(err.to_string()),
            _ => Self::InvalidArgument(err.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
