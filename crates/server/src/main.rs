use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groovio_core::{
    load_config, validate_config, AcquisitionPipeline, ArtifactStore, Config, Dispatcher,
    JobStore, MetadataProvider, SpotifyClient, SqliteJobStore, WorkerPool, YtDlpPipeline,
};
use groovio_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("GROOVIO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);
    info!("Artifact directory: {:?}", config.storage.artifact_dir);

    // Create SQLite job store
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Create artifact store
    let artifacts = ArtifactStore::new(&config.storage.artifact_dir)
        .context("Failed to create artifact store")?;

    // Create dispatcher if enabled
    let dispatcher = if config.dispatcher.enabled {
        match build_dispatcher(&config, Arc::clone(&job_store), artifacts.clone()).await {
            Ok(dispatcher) => {
                dispatcher
                    .start()
                    .await
                    .context("Failed to start dispatcher")?;
                Some(Arc::new(dispatcher))
            }
            Err(e) => {
                error!("Dispatcher enabled but could not be created: {:#}", e);
                None
            }
        }
    } else {
        info!("Dispatcher disabled in config");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        job_store,
        artifacts,
        dispatcher.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop dispatcher if running
    if let Some(ref dispatcher) = dispatcher {
        info!("Stopping dispatcher...");
        dispatcher.stop().await;
    }

    info!("Server shut down");
    Ok(())
}

/// Wire the metadata client, acquisition pipeline and worker pool.
async fn build_dispatcher(
    config: &Config,
    job_store: Arc<dyn JobStore>,
    artifacts: ArtifactStore,
) -> Result<Dispatcher> {
    let metadata: Arc<dyn MetadataProvider> = Arc::new(
        SpotifyClient::new(&config.spotify).context("Failed to create Spotify client")?,
    );
    info!("Spotify client initialized");

    let pipeline = YtDlpPipeline::new(
        config.acquisition.clone(),
        &config.storage.temp_dir,
        artifacts,
    )
    .context("Failed to create acquisition pipeline")?;

    if let Err(e) = pipeline.validate().await {
        warn!("Acquisition tools unavailable, jobs will fail until fixed: {}", e);
    }
    let pipeline: Arc<dyn AcquisitionPipeline> = Arc::new(pipeline);

    let pool = Arc::new(WorkerPool::new(config.dispatcher.max_concurrent_jobs));
    info!(
        capacity = pool.capacity(),
        "Worker pool initialized"
    );

    Ok(Dispatcher::new(
        config.dispatcher.clone(),
        job_store,
        metadata,
        pipeline,
        pool,
    ))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
