//! CamVault - HTTP server
//!
//! Receives camera uploads, stores them encrypted and serves decrypted
//! copies to their owners.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use camvault::{build_router, ImageVault, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "camvault=info,camvault_server=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    init_tracing(config.json_logs);

    tracing::info!("CamVault server v{} starting", camvault::VERSION);

    let vault = ImageVault::open(&config)
        .with_context(|| format!("opening vault at {}", config.data_dir.display()))?;

    let app = build_router(Arc::new(vault), config.max_upload_bytes());

    let addr = config.listen_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("Public image base: {}", config.public_base_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
