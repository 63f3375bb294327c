use std::sync::Arc;
use std::time::Duration;

use scene_branches::InMemoryBranchStore;
use scene_engine::BranchManager;
use scene_store::{InMemoryElementStore, InMemorySceneDirectory, SceneDirectory};
use scene_sync::{
    ComplianceChecker, DisabledComplianceChecker, ElementReplicator, ElementService,
    LocalElementService, ReplicationWorker, StaticComplianceChecker, UnavailableElementService,
};

use crate::config::AppConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BranchManager>,
    pub scenes: Arc<dyn SceneDirectory>,
    pub max_job_wait: Duration,
}

impl AppState {
    /// Wire in-memory backends according to `config`.
    ///
    /// With compliance enabled and no checker supplied, every branch passes.
    /// Must be called inside a tokio runtime: the replication worker starts
    /// immediately.
    pub fn from_config(config: &AppConfig) -> Self {
        let compliance: Arc<dyn ComplianceChecker> = if config.services.compliance_enabled {
            Arc::new(StaticComplianceChecker::compliant())
        } else {
            Arc::new(DisabledComplianceChecker)
        };
        Self::with_compliance(config, compliance)
    }

    /// Like [`from_config`](Self::from_config) with an injected checker.
    /// The checker is ignored when compliance is disabled.
    pub fn with_compliance(config: &AppConfig, compliance: Arc<dyn ComplianceChecker>) -> Self {
        let scenes: Arc<dyn SceneDirectory> = Arc::new(InMemorySceneDirectory::new());
        let elements: Arc<dyn ElementService> = if config.services.element_service_enabled {
            Arc::new(LocalElementService::new(
                Arc::new(InMemoryElementStore::new()),
                scenes.clone(),
                config.replication.call_timeout(),
            ))
        } else {
            tracing::warn!("element service disabled, branches will be created empty");
            Arc::new(UnavailableElementService::default())
        };
        let compliance = if config.services.compliance_enabled {
            compliance
        } else {
            Arc::new(DisabledComplianceChecker)
        };

        let replicator = Arc::new(ElementReplicator::new(elements, config.replication.clone()));
        let worker = Arc::new(ReplicationWorker::start(replicator.clone()));
        let manager = BranchManager::new(
            Arc::new(InMemoryBranchStore::new()),
            replicator,
            worker,
            compliance,
            config.engine.clone(),
        );
        tracing::info!(
            element_service = config.services.element_service_enabled,
            compliance = config.services.compliance_enabled,
            "scene engine ready"
        );

        Self {
            manager: Arc::new(manager),
            scenes,
            max_job_wait: Duration::from_millis(config.server.max_job_wait_ms),
        }
    }
}
