//! Telemetry agent CLI for fleet nodes.
#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};

use fleetmon_common::{init_logging, LogConfig};
use fleetmon_telemetry::{collect_cycle, resolve_node_id, DevicePaths};

#[derive(Parser)]
#[command(name = "fleetmon-agent", about = "Node telemetry agent for fleetmon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one telemetry record and print it
    Collect {
        /// Output format (json or pretty)
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Sampling window in milliseconds for rate-based metrics
        #[arg(long, default_value_t = 200)]
        sample_ms: u64,

        /// Override node ID (defaults to FLEETMON_NODE_ID or HOSTNAME)
        #[arg(long)]
        node_id: Option<String>,
    },

    /// Run the agent loop, pushing records to the hub
    Run {
        /// Hub base URL
        #[arg(long, default_value = "http://127.0.0.1:50051")]
        hub: String,

        /// Collection interval in seconds
        #[arg(long, default_value_t = 3)]
        interval_secs: u64,

        /// Override node ID (defaults to FLEETMON_NODE_ID or HOSTNAME)
        #[arg(long)]
        node_id: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    match cli.command {
        Commands::Collect {
            format,
            sample_ms,
            node_id,
        } => {
            let node_id = resolve_node_id(node_id);
            let mut collectors = DevicePaths::default().collectors();

            // First cycle establishes baselines for the stateful collectors,
            // the second produces the rates.
            collect_cycle(&mut collectors, &node_id);
            tokio::time::sleep(Duration::from_millis(sample_ms)).await;
            let record = collect_cycle(&mut collectors, &node_id);

            let output = match format {
                OutputFormat::Json => record.to_json()?,
                OutputFormat::Pretty => record.to_json_pretty()?,
            };
            println!("{}", output);
        }

        Commands::Run {
            hub,
            interval_secs,
            node_id,
        } => {
            run_agent(hub, interval_secs, node_id).await?;
        }
    }

    Ok(())
}

/// Collect on an interval and push each record to the hub.
///
/// Push failures are logged and the loop continues; the hub simply keeps
/// serving the previous record until the agent reaches it again.
async fn run_agent(hub: String, interval_secs: u64, node_id: Option<String>) -> Result<()> {
    let node_id = resolve_node_id(node_id);
    let endpoint = format!("{}/v1/telemetry", hub.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(interval_secs.max(1)))
        .build()?;

    let mut collectors = DevicePaths::default().collectors();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    info!(node_id = %node_id, endpoint = %endpoint, interval_secs, "Agent started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let record = collect_cycle(&mut collectors, &node_id);
                debug!(summary = %record.summary(), "Record assembled");

                match client.post(&endpoint).json(&record).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        debug!(status = %resp.status(), "Record pushed");
                    }
                    Ok(resp) => {
                        warn!(status = %resp.status(), "Hub rejected record");
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to push record");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping agent");
                break;
            }
        }
    }

    Ok(())
}
