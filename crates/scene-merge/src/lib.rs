//! Merge policy for scene branching.
//!
//! Turns a [`BranchDiff`](scene_diff::BranchDiff) into a [`MergePlan`]: the
//! actions that bring the target up to date with the source, and the
//! conflicts that block the merge. Applying the plan is left to the caller,
//! which owns the element store.
//!
//! Each paired element is judged against its common ancestor, recovered from
//! the rows' base fingerprints:
//!
//! - changed only in source: the source content is applied to target;
//! - changed only in target: target keeps its content;
//! - changed in both: modify/modify conflict;
//! - deleted on one side and modified on the other: delete/modify conflict.

pub mod ancestor;
pub mod conflict;
pub mod error;
pub mod plan;

pub use ancestor::{divergence, resolve_ancestor, Divergence};
pub use conflict::{ConflictType, MergeConflict};
pub use error::{MergeError, MergeResult};
pub use plan::{plan_merge, MergeAction, MergePlan, SkipReason, SkippedChange};
