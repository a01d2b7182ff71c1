//! VaultDrop Extraction Worker
//!
//! Standalone worker process: polls the extraction queue and runs the
//! worker pool until SIGINT/SIGTERM.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vaultdrop_common::config::{AppConfig, QueueBackend};
use vaultdrop_common::{metrics, Backends, VERSION};
use vaultdrop_worker::{ExtractionProcessor, LopdfExtractor, PoolSettings, WorkerPool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .json()
        .init();

    info!("Starting VaultDrop Extraction Worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    if config.queue.backend == QueueBackend::Memory {
        error!("The in-memory queue only works with the pool embedded in the gateway");
        return Err("queue.backend = memory requires worker.embedded on the gateway".into());
    }

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    metrics::install_exporter(&config.observability)?;

    // Connect backends
    let backends = Backends::connect(&config).await?;

    let processor = ExtractionProcessor::new(
        backends.repository.clone(),
        backends.store.clone(),
        Arc::new(LopdfExtractor),
    );
    let pool = WorkerPool::new(
        backends.source.clone(),
        Arc::new(processor),
        PoolSettings::from_config(&config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn(pool.run(shutdown_rx));

    info!("Extraction worker ready, polling queue...");
    shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    running.await?;

    info!("Extraction worker shutting down");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
