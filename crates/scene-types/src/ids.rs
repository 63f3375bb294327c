//! Time-ordered identifiers.
//!
//! Every persisted entity is keyed by a UUID v7 wrapped in its own newtype so
//! that a branch id can never be passed where an element id is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Short representation (first 8 characters of the UUID).
            pub fn short_id(&self) -> String {
                self.0.to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifier of a scene document.
    SceneId,
    "scene"
);

define_id!(
    /// Identifier of a branch within a scene.
    BranchId,
    "branch"
);

define_id!(
    /// Identifier of a single element row. Copies get fresh ids.
    ElementId,
    "element"
);

define_id!(
    /// Identifier of a write-once snapshot.
    SnapshotId,
    "snapshot"
);

define_id!(
    /// Correlation key shared by an element and every copy made of it.
    ///
    /// Assigned once when an element is first created. Replication, snapshot
    /// restore, and merge preserve it, so diff and merge can pair elements
    /// across branches without relying on element ids.
    LineageId,
    "lineage"
);

define_id!(
    /// Identifier of a background replication or purge job.
    JobId,
    "job"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = BranchId::new();
        let b = BranchId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_ids_are_time_ordered() {
        let first = ElementId::new();
        let second = ElementId::new();
        assert!(first < second);
    }

    #[test]
    fn parse_roundtrip() {
        let id = SceneId::new();
        let parsed: SceneId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_trims_whitespace() {
        let id = SnapshotId::new();
        let parsed: SnapshotId = format!("  {id} ").parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<BranchId>().unwrap_err();
        match err {
            TypeError::InvalidId { kind, value, .. } => {
                assert_eq!(kind, "branch");
                assert_eq!(value, "not-a-uuid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn debug_uses_short_form() {
        let id = JobId::new();
        let debug = format!("{id:?}");
        assert!(debug.starts_with("JobId("));
        assert_eq!(id.short_id().len(), 8);
    }

    #[test]
    fn serde_is_transparent() {
        let id = LineageId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: LineageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
