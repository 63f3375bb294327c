//! Diff engine for scene branching.
//!
//! Compares the element sets of two branches, pairing rows by
//! [`LineageId`](scene_types::LineageId) rather than by element id, since
//! every copy of an element gets a fresh id.
//!
//! # Key Types
//!
//! - [`BranchDiff`] / [`DiffEntry`] -- full diff with both sides of every change
//! - [`DiffReport`] / [`ElementChange`] -- client-facing summary
//! - [`LineageIndex`] -- per-lineage view of one branch (live row and tombstone)

pub mod branch_diff;
pub mod lineage;
pub mod report;

pub use branch_diff::{diff_elements, BranchDiff, ChangeKind, DiffEntry};
pub use lineage::{LineageIndex, LineageSlot};
pub use report::{DiffReport, ElementChange};
