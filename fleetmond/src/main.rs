//! fleetmond: fleet aggregator daemon.
//!
//! Polls one or more telemetry hubs, scores every known node, and keeps the
//! latest fleet-wide scores in memory with optional SQLite persistence.

#![forbid(unsafe_code)]

mod aggregator;
mod config;
mod score;
mod sink;
mod trend;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fleetmon_common::{LogConfig, init_logging};

use aggregator::{AggregatorOptions, FleetAggregator, FleetState};
use sink::{NullSink, Sink, SqliteSink};

#[derive(Parser, Debug)]
#[command(name = "fleetmond", version, about = "Fleet telemetry aggregator")]
struct Cli {
    /// Hub endpoints to poll, e.g. http://127.0.0.1:50051
    #[arg(value_name = "HUB")]
    hubs: Vec<String>,

    /// Path to fleetmond.toml (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds between poll cycles
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Score database path
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Disable score persistence entirely
    #[arg(long)]
    no_db: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", config::example_config());
        return Ok(());
    }

    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _guards = init_logging(&log_config)?;

    let mut config = config::load_config(cli.config.as_deref())?;

    // CLI flags override file settings.
    if !cli.hubs.is_empty() {
        config.hubs = cli.hubs.clone();
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(db) = cli.db.clone() {
        config.db_path = Some(db);
    }

    if config.hubs.is_empty() {
        config.hubs = vec!["http://127.0.0.1:50051".to_string()];
    }

    let sink: Box<dyn Sink> = if cli.no_db {
        info!("Score persistence disabled");
        Box::new(NullSink)
    } else {
        let path = match config.db_path.clone() {
            Some(path) => path,
            None => config::default_db_path()?,
        };
        info!("Persisting scores to {:?}", path);
        Box::new(SqliteSink::new(&path).context("Failed to open score database")?)
    };

    let options = AggregatorOptions {
        poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        weights: config.weights,
    };

    info!(
        hubs = ?config.hubs,
        interval_secs = config.poll_interval_secs,
        "Starting fleet aggregator"
    );

    let state = Arc::new(Mutex::new(FleetState::new()));
    let shutdown = Arc::new(AtomicBool::new(false));

    let aggregator = FleetAggregator::new(
        config.hubs,
        Arc::clone(&state),
        sink,
        options,
        Arc::clone(&shutdown),
    );
    let handle = aggregator.start();

    shutdown_signal().await?;
    info!("Shutdown signal received");
    shutdown.store(true, Ordering::Relaxed);
    // The loop observes the flag at the next cycle boundary.
    let _ = handle.await;

    let state = state.lock().expect("fleet state lock");
    info!(nodes = state.len(), "Aggregator stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
        }
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}
