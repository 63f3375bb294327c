use std::future::Future;

use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// Scene branching HTTP server.
pub struct SceneServer {
    config: AppConfig,
    state: AppState,
}

impl SceneServer {
    /// Build the engine from `config`. Requires a tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let state = AppState::from_config(&config);
        Self { config, state }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `signal` resolves, then stop the replication worker.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        tracing::info!(addr = %self.config.server.bind_addr, "scene server listening");
        let manager = self.state.manager.clone();
        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(signal)
            .await?;
        tracing::info!("scene server stopping");
        manager.shutdown().await;
        Ok(())
    }
}
