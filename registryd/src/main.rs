mod api;
mod config;
mod registry;
mod store;

use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::registry::RegistryHandle;
use crate::store::db::RegistryDb;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("registryd=info"))
        )
        .init();

    tracing::info!("Starting registryd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/service-registry/registryd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    // Open SQLite store
    let db = RegistryDb::open(&config.store.db_path)?;
    tracing::info!("Opened registry store at {:?}", config.store.db_path);

    // Start registry thread
    let registry = RegistryHandle::spawn(db, config.registry.clone());

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn background sweeper task
    let sweeper_registry = registry.clone();
    let sweeper_config = config.registry.clone();
    let sweeper_cancel = cancel.clone();
    let sweeper_handle = tokio::spawn(async move {
        if let Err(e) = registry::run_sweeper(sweeper_registry, sweeper_config, sweeper_cancel).await {
            tracing::error!("Sweeper error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        registry: registry.clone(),
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(sweeper_handle, server_handle);

    // Shutdown registry thread
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown registry: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
