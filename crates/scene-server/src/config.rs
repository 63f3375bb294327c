use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use scene_engine::EngineConfig;
use scene_sync::ReplicationConfig;

use crate::error::{ServerError, ServerResult};

/// Complete server configuration, one TOML table per concern.
///
/// ```toml
/// [server]
/// bind_addr = "127.0.0.1:8080"
///
/// [engine]
/// enforce_compliance = false
///
/// [replication]
/// max_concurrent_jobs = 8
///
/// [services]
/// element_service_enabled = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub replication: ReplicationConfig,
    pub services: ServicesConfig,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound for `GET /v1/jobs/:id?wait_ms=`.
    pub max_job_wait_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_job_wait_ms: 30_000,
        }
    }
}

/// Which optional peers are wired in at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// When off, every element call fails as unavailable; branch records
    /// still work.
    pub element_service_enabled: bool,
    pub compliance_enabled: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            element_service_enabled: true,
            compliance_enabled: false,
        }
    }
}
