//! Fleetmon telemetry hub.
//!
//! Receives records pushed by node agents and serves the latest record per
//! node to aggregators over HTTP.

#![forbid(unsafe_code)]

mod http_api;
mod mailbox;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fleetmon_common::{init_logging, LogConfig};

use http_api::HttpState;
use mailbox::TelemetryMailbox;

#[derive(Parser)]
#[command(name = "fleetmon-hubd")]
#[command(author, version, about = "Fleetmon telemetry hub")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:50051")]
    listen: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    info!(listen = %cli.listen, "Starting fleetmon hub");

    let mailbox = Arc::new(TelemetryMailbox::new());
    let router = http_api::create_router(HttpState::new(mailbox));

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("hub server error")?;

    info!("Hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
