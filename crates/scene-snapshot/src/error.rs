use thiserror::Error;

use scene_branches::BranchStoreError;
use scene_sync::SyncError;
use scene_types::{BranchId, BranchStatus, SnapshotId};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported snapshot format version: {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot payload truncated: {0} bytes")]
    Truncated(usize),

    #[error("snapshot payload CRC32 mismatch")]
    CrcMismatch,

    #[error("snapshot element count mismatch: header says {expected}, payload has {actual}")]
    CountMismatch { expected: u32, actual: usize },

    #[error("snapshot {0} does not match its recorded checksum")]
    ChecksumMismatch(SnapshotId),

    #[error("too many elements for one snapshot: {0}")]
    TooManyElements(usize),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("branch {id} is {status}, snapshots can only be restored into ACTIVE branches")]
    BranchNotActive { id: BranchId, status: BranchStatus },

    #[error(transparent)]
    Branches(#[from] BranchStoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl SnapshotError {
    /// Returns `true` when the stored payload itself is damaged or unreadable.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::UnsupportedVersion(_)
                | Self::Truncated(_)
                | Self::CrcMismatch
                | Self::CountMismatch { .. }
                | Self::ChecksumMismatch(_)
                | Self::DecompressionFailed(_)
                | Self::Serialization(_)
        )
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
