use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{BranchId, SceneId, SnapshotId};

/// Lifecycle state of a branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    Active,
    Merged,
    Archived,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Merged => "MERGED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Only `ACTIVE` branches may move, and only to a terminal state.
    pub fn can_transition_to(&self, next: BranchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Merged) | (Self::Active, Self::Archived)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "MERGED" => Ok(Self::Merged),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(TypeError::UnknownBranchStatus(s.to_string())),
        }
    }
}

/// A named, versioned line of work inside a scene.
///
/// The main branch has no parent; every other branch was forked from a parent
/// in the same scene, so a scene's branches form a rooted tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub scene_id: SceneId,
    pub name: String,
    pub description: String,
    pub parent_branch_id: Option<BranchId>,
    pub is_main: bool,
    pub status: BranchStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// The root branch of a scene.
    pub fn main(scene_id: SceneId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::build(scene_id, name.into(), description.into(), None)
    }

    /// A branch forked from `parent`.
    pub fn fork(
        scene_id: SceneId,
        parent: BranchId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(scene_id, name.into(), description.into(), Some(parent))
    }

    fn build(
        scene_id: SceneId,
        name: String,
        description: String,
        parent_branch_id: Option<BranchId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BranchId::new(),
            scene_id,
            name,
            description,
            is_main: parent_branch_id.is_none(),
            parent_branch_id,
            status: BranchStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BranchStatus::Active
    }

    /// Advance the version by one and refresh `updated_at`.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Write-once capture of a branch's live elements.
///
/// `payload` is opaque to everything except the snapshot codec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub branch_id: BranchId,
    pub name: String,
    /// Branch version at the time of capture.
    pub branch_version: u64,
    pub element_count: u32,
    /// Hex BLAKE3 of `payload`.
    pub checksum: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        branch_id: BranchId,
        name: impl Into<String>,
        branch_version: u64,
        element_count: u32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            branch_id,
            name: name.into(),
            branch_version,
            element_count,
            checksum: blake3::hash(&payload).to_hex().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if the payload still hashes to the recorded checksum.
    pub fn verify_checksum(&self) -> bool {
        blake3::hash(&self.payload).to_hex().as_str() == self.checksum
    }

    /// Metadata without the payload.
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id,
            branch_id: self.branch_id,
            name: self.name.clone(),
            branch_version: self.branch_version,
            element_count: self.element_count,
            checksum: self.checksum.clone(),
            size_bytes: self.payload.len() as u64,
            created_at: self.created_at,
        }
    }
}

/// Snapshot metadata, as listed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub branch_id: BranchId,
    pub name: String,
    pub branch_version: u64,
    pub element_count: u32,
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
