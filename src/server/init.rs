//! Server initialization and run loop

use super::config::AppConfig;
use super::loader::load_config;
use super::manifests::{load_manifests, seed};
use super::validation::validate_config;
use anyhow::{Context, Result};
use runbridge_core::{
    shutdown_signal_with_controller, Controller, InMemoryStore, ObjectStore, Reconciler,
    ShutdownController,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the controller until Ctrl+C or SIGTERM
///
/// `manifests` overrides `store.manifests_dir` from the configuration.
pub async fn run(manifests: Option<PathBuf>) -> Result<()> {
    info!("Starting Runbridge v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    info!("Configuration loaded");
    validate_config(&config)?;

    let store = init_store(&config, manifests).await?;
    let reconciler = Reconciler::new(
        store.clone() as Arc<dyn ObjectStore>,
        config.controller.reconciler_config(),
    );
    let controller = Controller::new(
        reconciler,
        store as Arc<dyn ObjectStore>,
        config.controller.controller_config(),
    );
    info!(
        workers = config.controller.workers,
        resync_secs = config.controller.resync_interval_secs,
        "Controller initialized"
    );

    let shutdown = ShutdownController::new();
    let signal = tokio::spawn(shutdown_signal_with_controller(shutdown.clone()));

    let guard = shutdown.register_task();
    let result = controller.run(shutdown.token()).await;
    guard.complete();

    if let Err(e) = result {
        signal.abort();
        return Err(e).context("Controller stopped unexpectedly");
    }
    if let Err(e) = signal.await {
        warn!(error = %e, "Shutdown task failed");
    }

    info!("Runbridge shutdown complete");
    Ok(())
}

async fn init_store(config: &AppConfig, manifests: Option<PathBuf>) -> Result<Arc<InMemoryStore>> {
    let store = Arc::new(InMemoryStore::new(config.store.watch_capacity));
    info!(
        watch_capacity = config.store.watch_capacity,
        "In-memory store initialized"
    );

    match manifests.or_else(|| config.store.manifests_dir.clone()) {
        Some(dir) => {
            let objects = load_manifests(&dir)?;
            seed(&store, objects).await;
        }
        None => warn!("No manifest directory configured, starting with an empty store"),
    }
    Ok(store)
}
