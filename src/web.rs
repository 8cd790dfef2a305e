use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use typescope::config::ServerConfig;
use typescope::routes::{create_router, AppState};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let state = AppState::from_config(&config)
        .await
        .with_context(|| format!("preparing upload dir {}", config.upload_dir.display()))?;

    info!(
        upload_dir = %state.uploads.dir().display(),
        scratch_dir = %state.scratch.path().display(),
        exec_proxy = state.exec.is_configured(),
        max_body_bytes = config.max_body_bytes,
        "typescope-web starting"
    );

    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, "listening");

    // The router owns the scratch dir; returning from serve drops and removes it.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
