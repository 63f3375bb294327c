//! Branch and snapshot records for scene branching.
//!
//! Branches are the named lines of work inside a scene. Each scene has one
//! main branch with no parent; every other branch names its parent, so the
//! branch set of a scene forms a rooted tree. Snapshots are write-once
//! captures of a branch's elements, stored next to the branch that owns them.
//!
//! # Architecture
//!
//! - **Branches** are versioned records. Every update is a compare-and-swap
//!   on the branch version.
//! - **Main branches** are unique per scene; the store rejects a second one
//!   atomically.
//! - **Snapshots** are immutable once written.
//!
//! # Modules
//!
//! - [`error`]: Error types for branch store operations
//! - [`traits`]: The [`BranchStore`] trait defining the storage interface
//! - [`names`]: Branch and snapshot name validation
//! - [`memory`]: In-memory [`InMemoryBranchStore`] for tests and embedding

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{BranchStoreError, Result};
pub use memory::InMemoryBranchStore;
pub use names::{validate_branch_name, validate_snapshot_name};
pub use traits::BranchStore;
