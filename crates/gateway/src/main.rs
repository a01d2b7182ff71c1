//! VaultDrop Intake Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Document uploads (streamed, size-capped, sniffed, scanned)
//! - Document metadata and extracted text queries
//! - Signed links to processed artifacts
//! - Rate limiting and observability (logging, metrics, request ids)
//!
//! With `worker.embedded` the extraction pool runs in this process, which
//! is required when the queue backend is the in-memory channel.

mod handlers;
mod intake;
mod middleware;


use axum::{
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, Request},
    http::Method,
    middleware::{from_fn, Next},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vaultdrop_common::{
    config::{AppConfig, QueueBackend},
    db::DocumentRepository,
    errors::Result,
    metrics,
    queue::JobQueue,
    storage::ObjectStore,
    Backends, UrlSigner, VERSION,
};
use vaultdrop_worker::{ExtractionProcessor, LopdfExtractor, PoolSettings, WorkerPool};

use crate::intake::FileNameSanitizer;
use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};
use crate::middleware::timeout::request_timed_out;

/// Extra room above the file ceiling for multipart framing
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn DocumentRepository>,
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub signer: Arc<UrlSigner>,
    pub sanitizer: FileNameSanitizer,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, backends: &Backends, signer: UrlSigner) -> Result<Self> {
        Ok(Self {
            config,
            repository: backends.repository.clone(),
            store: backends.store.clone(),
            queue: backends.queue.clone(),
            signer: Arc::new(signer),
            sanitizer: FileNameSanitizer::new()?,
        })
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .json()
        .init();

    info!("Starting VaultDrop Intake Gateway v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    if config.queue.backend == QueueBackend::Memory && !config.worker.embedded {
        error!("The in-memory queue has no consumer unless worker.embedded is set");
        return Err("queue.backend = memory requires worker.embedded = true".into());
    }

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    metrics::install_exporter(&config.observability)?;

    // Connect backends
    info!("Connecting backends...");
    let backends = Backends::connect(&config).await?;

    let state = AppState::new(config.clone(), &backends, UrlSigner::from_config(&config.signing))?;
    let app = create_router(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Embedded extraction pool
    let pool = config.worker.embedded.then(|| {
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
        info!(concurrency = config.worker.concurrency, "Starting embedded extraction pool");
        tokio::spawn(pool.run(shutdown_rx.clone()))
    });

    // Start the server
    let ip = config.server.host.parse::<std::net::IpAddr>()?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut server_rx = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    drain(server, pool, config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for the server and the embedded pool together under one grace period.
/// Whatever is still running when it elapses is abandoned.
async fn drain<E>(
    server: JoinHandle<std::result::Result<(), E>>,
    pool: Option<JoinHandle<()>>,
    grace: Duration,
) -> std::result::Result<(), Box<dyn std::error::Error>>
where
    E: std::error::Error + 'static,
{
    let pool = async move {
        match pool {
            Some(pool) => pool.await,
            None => Ok(()),
        }
    };

    match tokio::time::timeout(grace, async { tokio::join!(server, pool) }).await {
        Ok((served, drained)) => {
            served??;
            drained?;
        }
        Err(_) => warn!(grace_secs = grace.as_secs(), "Grace period elapsed with work still in flight"),
    }
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = state
        .config
        .upload
        .max_file_bytes
        .saturating_add(MULTIPART_OVERHEAD)
        .try_into()
        .unwrap_or(usize::MAX);

    let mut upload_route = post(handlers::upload::upload).layer(DefaultBodyLimit::max(body_limit));
    if state.config.rate_limit.enabled {
        let rps = state.config.rate_limit.requests_per_second;
        let limiter = create_rate_limiter(rps, state.config.rate_limit.burst);
        upload_route = upload_route.layer(from_fn(move |req: Request, next: Next| {
            rate_limit_middleware(req, next, limiter.clone(), rps)
        }));
    }

    let max_concurrent = state.config.server.max_concurrent_requests.max(1);

    // Query / download surface; uploads stream for as long as the body takes
    let queries = Router::new()
        .route("/ready", get(handlers::health::ready))
        .route("/documents/{id}", get(handlers::documents::get_document))
        .route("/documents/{id}/text", get(handlers::documents::get_text))
        .route("/documents/{id}/processed-url", get(handlers::documents::processed_url))
        .route("/documents/{id}/download", get(handlers::documents::download))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(request_timed_out))
                .timeout(state.config.request_timeout()),
        );

    Router::new()
        .route("/healthz", get(handlers::health::health))

        // Intake
        .route("/documents", upload_route)

        .merge(queries)
        .route_layer(from_fn(middleware::metrics::track_requests))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
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
