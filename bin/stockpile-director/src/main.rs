//! Stockpile Director - fleet image pre-caching service
//!
//! Long-running director that keeps a configured fraction of the idle
//! bare-metal fleet pre-loaded with weighted operating-system images, so
//! provisioning elsewhere only has to boot what is already staged.

mod director;
mod rate_limit;
mod stats;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use stockpile_client::{
    HttpCatalogClient, HttpInventoryClient, HttpNodeCommandClient, RetryPolicy,
};
use stockpile_common::Config;
use stockpile_strategy::build_strategy;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::director::Director;
use crate::stats::DirectorStats;

#[derive(Parser, Debug)]
#[command(name = "stockpile-director")]
#[command(about = "Stockpile fleet image pre-caching director")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/stockpile/director.toml")]
    config: String,

    /// Compute and log directives without touching hardware
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))?;
    if args.dry_run {
        config.director.dry_run = true;
    }

    info!("Starting Stockpile director");
    info!("Config file: {}", args.config);
    info!("Inventory endpoint: {}", config.inventory.api_endpoint);
    info!("Catalog endpoint: {}", config.catalog.api_endpoint);
    if config.director.dry_run {
        info!("Dry run is ENABLED: no directive will touch hardware");
    }

    let strategy = build_strategy(&config.strategy)?;
    info!(
        "Strategy: {} targeting {:.0}% of eligible nodes",
        strategy.name(),
        config.strategy.percentage_to_cache * 100.0
    );

    let retry = RetryPolicy::from_config(&config.client);
    let inventory = Arc::new(HttpInventoryClient::new(&config.inventory.api_endpoint)?);
    let catalog = Arc::new(HttpCatalogClient::new(&config.catalog.api_endpoint)?);
    // Node commands go through the inventory service's node resource.
    let commands = Arc::new(HttpNodeCommandClient::new(
        &config.inventory.api_endpoint,
        retry,
    )?);

    let stats = Arc::new(DirectorStats::default());

    let listen: SocketAddr = config.status.listen.parse().map_err(|e| {
        anyhow::anyhow!("invalid status listen address {}: {e}", config.status.listen)
    })?;

    let director = Arc::new(Director::new(
        &config,
        strategy,
        inventory,
        catalog,
        commands,
        stats.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let director_task = tokio::spawn(director.run(shutdown_rx));

    let status_stats = stats.clone();
    let status_task = tokio::spawn(async move {
        if let Err(e) = status::serve_status(listen, status_stats).await {
            tracing::error!("Status server error: {e}");
        }
    });

    info!("Started Stockpile service");

    tokio::signal::ctrl_c().await.ok();
    info!("Shutting down...");
    shutdown_tx.send(true).ok();
    director_task.await.ok();
    status_task.abort();

    info!("Director shut down gracefully");

    Ok(())
}
