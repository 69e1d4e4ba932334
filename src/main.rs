mod config;
mod error;
mod gemini;
mod i18n;
mod models;
mod orchestrator;
mod routes;
mod store;
mod styles;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, gemini::GeminiClient, orchestrator::Orchestrator, routes::AppState, styles::StyleCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("configuration error")?;
    tracing::info!("Using API key: {}...", config.gemini.api_key.chars().take(4).collect::<String>());

    let catalog = StyleCatalog::builtin().context("failed to load style catalog")?;
    tracing::info!("🎨 Loaded {} styles: {}", catalog.len(), catalog.ids().join(", "));

    let client = GeminiClient::new(&config.gemini)?;
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(catalog, Arc::new(client), config.language)),
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
