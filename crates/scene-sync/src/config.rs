//! Replication tuning.
//!
//! Loaded from the `[replication]` table of the server configuration. Every
//! field has a default, so an empty table is valid:
//!
//! ```toml
//! [replication]
//! call_timeout_ms = 30000
//! batch_timeout_ms = 60000
//! max_elements_per_fetch = 10000
//! queue_capacity = 256
//! max_concurrent_jobs = 4
//! shutdown_timeout_ms = 10000
//! job_retention_ms = 3600000
//! max_retained_jobs = 10000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Deadline for a single cross-service call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Deadline shared by every call of one bulk copy or purge.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Cap on the rows fetched from a branch in one listing.
    #[serde(default = "default_max_elements_per_fetch")]
    pub max_elements_per_fetch: usize,

    /// Jobs that may wait in the worker queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Jobs that may run at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// How long shutdown waits for running jobs before cancelling them.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// How long a finished job's status stays queryable.
    #[serde(default = "default_job_retention_ms")]
    pub job_retention_ms: u64,

    /// Cap on finished jobs kept; the oldest are dropped first. Unfinished
    /// jobs are never dropped.
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_batch_timeout_ms() -> u64 {
    60_000
}

fn default_max_elements_per_fetch() -> usize {
    10_000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

fn default_job_retention_ms() -> u64 {
    3_600_000
}

fn default_max_retained_jobs() -> usize {
    10_000
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
            max_elements_per_fetch: default_max_elements_per_fetch(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            job_retention_ms: default_job_retention_ms(),
            max_retained_jobs: default_max_retained_jobs(),
        }
    }
}

impl ReplicationConfig {
    /// Short deadlines for tests.
    pub fn for_testing() -> Self {
        Self {
            call_timeout_ms: 500,
            batch_timeout_ms: 2_000,
            max_elements_per_fetch: 1_000,
            queue_capacity: 16,
            max_concurrent_jobs: 2,
            shutdown_timeout_ms: 500,
            job_retention_ms: 60_000,
            max_retained_jobs: 256,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_millis(self.job_retention_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReplicationConfig::default();
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.batch_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_elements_per_fetch, 10_000);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.job_retention(), Duration::from_secs(3600));
        assert_eq!(config.max_retained_jobs, 10_000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ReplicationConfig =
            serde_json::from_str(r#"{"queue_capacity": 8}"#).unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.call_timeout_ms, 30_000);
    }
}
