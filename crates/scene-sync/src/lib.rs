//! Cross-service element replication for scene branching.
//!
//! Elements live behind a service boundary owned by the scene service. This
//! crate holds the contracts the branching engine consumes across that
//! boundary and the background machinery built on them:
//!
//! - [`ElementService`] -- list/create/update/delete elements and read scenes,
//!   with a local adapter and a degraded implementation
//! - [`ComplianceChecker`] -- read-only pass/fail with violations
//! - [`ElementReplicator`] -- best-effort bulk copy and purge of a branch
//! - [`ReplicationWorker`] -- bounded queue and parallelism, observable job
//!   state, drain-on-shutdown
//!
//! Replication never rolls back. Per-element failures are logged and counted;
//! retrying a partially copied branch can duplicate elements.

pub mod compliance;
pub mod config;
pub mod error;
pub mod replicator;
pub mod service;
pub mod worker;

pub use compliance::{
    ComplianceChecker, ComplianceReport, ComplianceStatus, DisabledComplianceChecker, Severity,
    StaticComplianceChecker, Violation,
};
pub use config::ReplicationConfig;
pub use error::{SyncError, SyncResult};
pub use replicator::{parents_first, ElementReplicator, Provenance, PurgeReport, ReplicationReport};
pub use service::{
    ElementService, ListQuery, LocalElementService, NewElement, UnavailableElementService,
};
pub use worker::{JobKind, JobOutcome, JobState, JobStatus, ReplicationWorker};
