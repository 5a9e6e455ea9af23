//! Application setup and wiring

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::application::{EngineSettings, WorkflowEngine};
use crate::config::{Config, StoreBackend};
use crate::infrastructure::providers::ProviderClientConfig;
use crate::infrastructure::store::StoreError;
use crate::infrastructure::{
    FileWorkflowStore, HttpReconProvider, HttpScanProvider, InMemoryWorkflowStore, WorkflowStore,
};
use crate::presentation::{AppState, create_router};

/// Handle returned from create_app for graceful shutdown coordination
pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
}

/// Error during application wiring
#[derive(Debug, thiserror::Error)]
pub enum AppInitError {
    #[error("failed to open workflow store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to initialise provider clients: {0}")]
    Provider(#[from] crate::infrastructure::providers::ProviderInitError),
}

/// Wire the store, provider clients and engine, run the restart-recovery
/// sweep, and assemble the router.
pub async fn create_app(config: Config) -> Result<AppHandle, AppInitError> {
    let config = Arc::new(config);

    let store: Arc<dyn WorkflowStore> = match config.store.backend {
        StoreBackend::File => {
            Arc::new(FileWorkflowStore::open(config.store.data_dir.clone()).await?)
        }
        StoreBackend::Memory => Arc::new(InMemoryWorkflowStore::new()),
    };

    let provider_timeout = Duration::from_secs(config.providers.request_timeout_seconds);
    let recon = Arc::new(HttpReconProvider::new(&ProviderClientConfig {
        base_url: config.providers.recon_base_url.clone(),
        request_timeout: provider_timeout,
    })?);
    let scanner = Arc::new(HttpScanProvider::new(&ProviderClientConfig {
        base_url: config.providers.scan_base_url.clone(),
        request_timeout: provider_timeout,
    })?);

    let engine = WorkflowEngine::new(
        store,
        recon,
        scanner,
        EngineSettings {
            max_concurrent_workflows: config.engine.max_concurrent_workflows,
            failure_threshold: config.engine.failure_threshold,
            high_risk_threshold: config.engine.high_risk_threshold,
        },
    );

    // Workflows left running by a previous process cannot be resumed; mark
    // them failed up front so polls get a definitive answer.
    match engine.recover_interrupted().await {
        Ok(0) => {}
        Ok(recovered) => tracing::info!(recovered, "Recovered interrupted workflows"),
        Err(e) => tracing::error!(error = %e, "Restart-recovery sweep failed"),
    }

    let shutdown_token = CancellationToken::new();
    let state = AppState {
        engine,
        config: config.clone(),
    };
    let router = create_router(state, config);

    Ok(AppHandle {
        router,
        shutdown_token,
    })
}
