//! # ordhub
//!
//! Coordination server binary: advisory locks and realtime broadcast for
//! order-editing terminals. Wires config, logging, and metrics together
//! and runs the server until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ordhub_server::config::{self, ServerConfig};
use ordhub_server::metrics::install_recorder;
use ordhub_server::server::CoordServer;

/// ordhub coordination server.
#[derive(Parser, Debug)]
#[command(name = "ordhub", about = "Advisory locks and realtime broadcast for order terminals")]
struct Cli {
    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON config file (defaults to `~/.ordhub/config.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines instead of human-readable output.
    #[arg(long)]
    json_logs: bool,
}

/// CLI flags win over both the config file and env overrides.
fn apply_cli_overrides(config: &mut ServerConfig, cli: &Cli) {
    if let Some(ref host) = cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.json_logs);

    let mut config = match &args.config {
        Some(path) => config::load_config_from_path(path).context("failed to load config")?,
        None => config::load_config().context("failed to load config")?,
    };
    apply_cli_overrides(&mut config, &args);

    let metrics_handle = install_recorder();
    let server = CoordServer::new(config, metrics_handle);

    let addr = server.listen().await.context("failed to bind server")?;
    server.spawn_sweeper();
    tracing::info!("ordhub listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server.shutdown().shutdown_and_drain(None).await;
    tracing::info!("shutdown complete");
    Ok(())
}
