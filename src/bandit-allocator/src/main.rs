//! Bandit Allocator — Thompson Sampling traffic allocation for A/B/n
//! experiments.
//!
//! Main entry point that wires the metric store, allocation engine, and
//! HTTP server together.

use bandit_api::ApiServer;
use bandit_core::config::AppConfig;
use bandit_engine::AllocationEngine;
use bandit_storage::InMemoryMetricStore;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bandit-allocator")]
#[command(about = "Thompson Sampling traffic allocation for A/B/n experiments")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "BANDIT_ALLOCATOR__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "BANDIT_ALLOCATOR__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Monte Carlo trials per allocation request (overrides config)
    #[arg(long, env = "BANDIT_ALLOCATOR__SAMPLER__TRIALS")]
    trials: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bandit_allocator=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Bandit Allocator starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(trials) = cli.trials {
        config.sampler.trials = trials;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        trials = config.sampler.trials,
        "Configuration loaded"
    );

    // Wire up the metric store and allocation engine
    let store = Arc::new(InMemoryMetricStore::new());
    let engine = Arc::new(AllocationEngine::new(store.clone(), config.sampler.trials));

    let api_server = ApiServer::new(config, store, engine);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Bandit Allocator is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
