//! cxr-labeler - Chest X-ray labeling service
//!
//! Serves the labeling core over HTTP: image upload with concurrent
//! prediction and review, prediction toggling, correction saving, retraining
//! and an SSE notification stream.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cxr_common::events::EventBus;
use cxr_common::config::create_default_config_if_missing;
use cxr_labeler::config::{load_toml, LabelerConfig};
use cxr_labeler::logging::init_tracing;
use cxr_labeler::services::HttpAnalysisBackend;
use cxr_labeler::{build_router, AppState, Labeler};
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for cxr-labeler
#[derive(Parser, Debug)]
#[command(name = "cxr-labeler")]
#[command(about = "Chest X-ray labeling service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML `port`)
    #[arg(short, long, env = "CXR_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "CXR_BIND")]
    bind: IpAddr,

    /// Base URL of the analysis backend
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Notification buffer per SSE client
const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config_path, toml_config) = load_toml(args.config.as_deref());
    init_tracing(&toml_config.logging.level);

    info!(
        "Starting CXR Labeler (cxr-labeler) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
        // Best effort: a read-only config dir must not stop the service
        if let Err(e) = create_default_config_if_missing(path) {
            warn!("Could not write default config to {}: {}", path.display(), e);
        }
    }

    let config = LabelerConfig::resolve(&toml_config, args.backend_url.as_deref(), args.port)
        .context("Invalid configuration")?;
    if let Some(timeout) = config.request_timeout {
        info!("Backend request timeout: {:?}", timeout);
    }

    let backend = HttpAnalysisBackend::new(config.backend_url.clone(), config.request_timeout)
        .context("Failed to create backend client")?;
    info!("Analysis backend: {}", backend.base_url());
    let labeler = Arc::new(Labeler::new(
        Arc::new(backend),
        EventBus::new(EVENT_BUS_CAPACITY),
    ));

    let app = build_router(AppState::new(labeler));

    let addr = SocketAddr::new(args.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cxr-labeler listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
