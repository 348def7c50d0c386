mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hubsync_core::{
    create_authenticator, load_config, validate_config, Authenticator, LfsSyncWorkerFactory,
    MirrorSyncComponent, MirrorTaskStore, SqliteMirrorTaskStore, SyncWorkerFactory,
    SyncWorkerManager,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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
    let config_path = std::env::var("HUBSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully (version {})", VERSION);
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!("Worker slots: {}", config.sync.manager.worker_count);

    // Log a config fingerprint so deployments are distinguishable in logs
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite mirror task store
    let task_store: Arc<dyn MirrorTaskStore> = Arc::new(
        SqliteMirrorTaskStore::new(&config.database.path)
            .context("Failed to create mirror task store")?,
    );
    info!("Mirror task store initialized");

    // Create the sync worker factory
    let worker_factory: Arc<dyn SyncWorkerFactory> = Arc::new(LfsSyncWorkerFactory::new(
        config.sync.syncer.clone(),
        Arc::clone(&task_store),
    ));

    // Create and start the worker manager
    let manager = Arc::new(SyncWorkerManager::new(
        config.sync.manager.clone(),
        Arc::clone(&task_store),
        worker_factory,
    ));
    manager
        .start()
        .await
        .context("Failed to start sync worker manager")?;
    info!("Sync worker manager started");

    // Outer management component for the HTTP layer
    let mirror_sync = MirrorSyncComponent::new(Arc::clone(&manager), Arc::clone(&task_store));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        Arc::clone(&manager),
        mirror_sync,
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

    // Stop the manager loops; in-flight tasks stay claimed in the store
    // and are reclaimed by the crash-recovery reset of the next start.
    info!("Server shutting down...");
    manager.stop();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
