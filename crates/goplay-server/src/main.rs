//! goplay HTTP server
//!
//! Accepts Go submissions and streams their sandboxed output as
//! server-sent events.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use goplay::{Config, Orchestrator, sweep_workspace_root};
use tokio::net::TcpListener;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::handlers::AppState;
use crate::router::build_router;

mod handlers;
mod router;

#[derive(Parser)]
#[command(name = "goplay-server")]
#[command(about = "HTTP API for streaming sandboxed Go execution")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    // Workspaces left behind by a previous process
    match sweep_workspace_root(&config.workspace_root).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, root = %config.workspace_root.display(), "removed stale workspaces"),
        Err(e) => warn!(error = %e, "failed to sweep workspace root"),
    }

    let bind = config.server.bind;
    info!(
        variants = config.variants.len(),
        default_variant = %config.default_variant,
        runner = %config.runner_binary().display(),
        "configuration loaded"
    );

    let orchestrator = Orchestrator::new(config).context("failed to create orchestrator")?;
    let app = build_router(AppState::new(orchestrator));

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
