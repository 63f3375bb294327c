//! Element storage for scene branching.
//!
//! The element store owns every [`Element`](scene_types::Element) row. It is
//! the sole mutator of elements: replication, merge and snapshot restore all
//! go through its compare-and-swap update path.
//!
//! # Storage Backends
//!
//! All backends implement the [`ElementStore`] trait:
//!
//! - [`InMemoryElementStore`] -- `HashMap`-based store for tests and embedding
//!
//! Scenes themselves are looked up through a [`SceneDirectory`]:
//!
//! - [`InMemorySceneDirectory`] -- `HashMap`-based directory for tests and embedding
//!
//! # Design Rules
//!
//! 1. Every successful update advances the version by exactly one.
//! 2. An update whose version does not match the stored row is rejected,
//!    never retried.
//! 3. Deletion is soft: the row stays as a tombstone with `is_deleted = true`.
//! 4. Only single-row atomicity is offered; there are no transactions.
//! 5. Listings exclude tombstones unless asked for them.

pub mod directory;
pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use directory::InMemorySceneDirectory;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryElementStore;
pub use query::ListOptions;
pub use traits::{ElementStore, SceneDirectory};
