use anyhow::Context;
use status_ingestor::{db, metrics, rest, Config, StatusService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("loading configuration")?;

    info!("Starting status ingestor");
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.database_host());
    info!("Storage timeout: {:?}", config.storage_timeout);

    metrics::init_metrics().context("registering metrics")?;

    // The pool is created once, before any request can arrive.
    let pool = db::make_pool(&config)
        .await
        .context("connecting to database")?;
    let store = Arc::new(db::PgStore::new(pool));

    let service = StatusService::new(store.clone(), config.storage_timeout);
    let app = rest::create_router(service);

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("binding to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
