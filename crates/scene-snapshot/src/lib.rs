//! Snapshots of scene branches.
//!
//! A snapshot freezes a branch's live elements into an opaque, write-once
//! payload tied to the branch version at capture. Restoring replays the
//! payload into the branch: the snapshot rows are inserted first and the
//! previous live set is soft-deleted afterwards, so readers never see an
//! empty branch in between.
//!
//! # Payload format
//!
//! ```text
//! +------+---------+-------+-------+----------------------------+
//! | SCNP | version | count | crc32 | zstd(bincode(Vec<Element>)) |
//! |  4B  | u32 BE  | u32 BE| u32 BE|            ...             |
//! +------+---------+-------+-------+----------------------------+
//! ```

pub mod codec;
pub mod engine;
pub mod error;

pub use codec::{decode_payload, encode_payload, FORMAT_VERSION, MAGIC};
pub use engine::{RestoreReport, SnapshotEngine};
pub use error::{SnapshotError, SnapshotResult};
