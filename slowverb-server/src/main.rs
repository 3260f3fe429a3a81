//! slowverb-server - slowed + reverb audio over HTTP
//!
//! Accepts a media locator on `POST /submit`, retrieves the audio with an
//! external tool, applies slowdown and echo, and streams the result back.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slowverb_common::config::{ensure_directory_exists, resolve_working_dir};
use slowverb_server::config::ServiceConfig;
use slowverb_server::pipeline::TransformStrategy;
use slowverb_server::{build_router, AppState};

/// Command-line arguments for slowverb-server
#[derive(Parser, Debug)]
#[command(name = "slowverb-server")]
#[command(about = "Slowed + reverb audio service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "SLOWVERB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for downloaded and intermediate audio files
    #[arg(short, long, env = "SLOWVERB_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Override the configured transformation strategy
    #[arg(short, long, value_enum)]
    strategy: Option<TransformStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = ServiceConfig::load(args.config.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    info!(
        "Starting slowverb-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SLOWVERB_GIT_HASH"),
        env!("SLOWVERB_BUILD_TIMESTAMP"),
        env!("SLOWVERB_BUILD_PROFILE")
    );

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(strategy) = args.strategy {
        config.pipeline.strategy = strategy;
    }

    let working_dir = resolve_working_dir(args.working_dir.as_deref(), config.working_dir.as_deref());
    ensure_directory_exists(&working_dir)
        .with_context(|| format!("Failed to initialize working directory {}", working_dir.display()))?;
    info!("Working directory: {}", working_dir.display());

    let shutdown = CancellationToken::new();
    let orchestrator = Arc::new(
        config
            .build_orchestrator(&working_dir, shutdown.clone())
            .context("Failed to build pipeline")?,
    );
    info!(
        strategy = %orchestrator.strategy(),
        retrieval = %config.retrieval.program,
        filter_graph = %config.filter_graph.program,
        "Pipeline ready"
    );

    let app = build_router(AppState::new(Arc::clone(&orchestrator)));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C / SIGTERM, then cancel in-flight requests
async fn shutdown_signal(orchestrator: Arc<slowverb_server::pipeline::PipelineOrchestrator>) {
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
                error!("Failed to install signal handler: {}", e);
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

    orchestrator.shutdown();
}
