//! Foundation types for scene branching.
//!
//! A scene is a collaborative floor-plan document. Its content lives in a
//! tree of [`Branch`]es, each holding an independently mutable set of
//! [`Element`]s. Every other scene crate depends on `scene-types`.
//!
//! # Key Types
//!
//! - [`SceneId`], [`BranchId`], [`ElementId`], [`SnapshotId`], [`LineageId`], [`JobId`] -- UUID v7 identifiers
//! - [`Scene`] -- the document that owns a branch tree
//! - [`Branch`] / [`BranchStatus`] -- a named, versioned line of work
//! - [`Element`] / [`ElementType`] / [`ElementProperties`] -- structural scene content
//! - [`Snapshot`] -- write-once capture of a branch's live elements
//! - [`Fingerprint`] -- BLAKE3 hash of an element's mutable content

pub mod branch;
pub mod element;
pub mod error;
pub mod fingerprint;
pub mod geometry;
pub mod ids;
pub mod scene;

pub use branch::{Branch, BranchStatus, Snapshot, SnapshotInfo};
pub use element::{Element, ElementField, ElementProperties, ElementType};
pub use error::{TypeError, TypeResult};
pub use fingerprint::Fingerprint;
pub use geometry::{Dimensions3D, Point2D, Point3D, Rotation3D};
pub use ids::{BranchId, ElementId, JobId, LineageId, SceneId, SnapshotId};
pub use scene::Scene;
