//! Star position server.
//!
//! Fetches the configured sky quadrants from the Gaia TAP archive in parallel
//! on every request and serves the Cartesian positions as JSON.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use star_server::{run_server, AppState};
use starstream::{Aggregator, StarstreamConfig, TapClient};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve Gaia star positions per sky quadrant")]
struct Args {
    #[arg(long, help = "JSON config file (quadrants, worker_count, tap settings)")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value = "3000")]
    port: u16,

    #[arg(long, help = "Override the worker pool size from the config")]
    workers: Option<usize>,

    #[arg(long, help = "Override the per-query row limit from the config")]
    max_rows: Option<u32>,

    #[arg(long, help = "Override the TAP endpoint URL from the config")]
    endpoint: Option<String>,
}

fn load_config(args: &Args) -> Result<StarstreamConfig> {
    let mut config = match &args.config {
        Some(path) => StarstreamConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StarstreamConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if let Some(max_rows) = args.max_rows {
        config.max_rows_per_query = max_rows;
    }
    if let Some(endpoint) = &args.endpoint {
        config.tap.endpoint = endpoint.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let aggregator = Aggregator::from_config(&config).context("Failed to start worker pool")?;
    info!(
        "Fetching {} quadrant task(s) with {} worker(s) from {}",
        aggregator.tasks().len(),
        config.worker_count,
        config.tap.endpoint
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    let state = AppState::new(aggregator, TapClient::new(&config));
    run_server(state, addr).await
}
