use anyhow::{Context, Result};
use signlab_store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("signlabd starting");

    let config = config::Config::from_env();
    tracing::info!(models = %config.model_dir.display(), bind = %config.bind_addr(), "configuration loaded");

    let store = Store::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    tracing::info!(path = %config.db_path.display(), "database ready");

    // Camera and models are optional; the engine degrades instead of failing.
    let engine = engine::spawn_engine(&config);

    let addr = config.bind_addr();
    let state = Arc::new(api::AppState::new(config, store, engine));
    api::handlers::spawn_sweeper(state.clone());
    let app = api::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "signlabd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("signlabd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
