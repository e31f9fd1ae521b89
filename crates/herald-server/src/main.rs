use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_core::HeraldConfig;
use herald_core::config::DEFAULT_STATE_DIR;
use herald_server::routes;
use herald_server::state::{AppState, resolve_api_key};
use herald_store::FileStoreFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("herald=info".parse()?))
        .with_target(false)
        .init();

    let allow_anonymous = std::env::var("HERALD_SERVER_ALLOW_ANONYMOUS")
        .is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
    let api_key = resolve_api_key(
        std::env::var("HERALD_SERVER_API_KEY").ok(),
        allow_anonymous,
    )?;
    if api_key.is_none() {
        tracing::warn!("HERALD_SERVER_ALLOW_ANONYMOUS set, /v1 routes are unauthenticated");
    }
    let port = std::env::var("HERALD_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let state = Arc::new(AppState {
        stores: FileStoreFactory::new(state_dir()?),
        api_key,
    });
    tracing::info!(state_dir = %state.stores.root().display(), "Serving persisted state");

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `HERALD_STATE_DIR`, else `state_dir` from `HERALD_CONFIG` if it exists.
fn state_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("HERALD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let config = PathBuf::from(
        std::env::var("HERALD_CONFIG").unwrap_or_else(|_| "herald.toml".to_string()),
    );
    if config.exists() {
        let config = HeraldConfig::load(&config).context("Failed to load config")?;
        return Ok(config.state_dir);
    }
    Ok(PathBuf::from(DEFAULT_STATE_DIR))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
