//! Relay daemon - deterministic voice-command routing.
//!
//! Routes each utterance through the deterministic device-control layer
//! first, then the primary conversation agent, then the fallback agent.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relayd::agents::HttpAgent;
use relayd::catalog::{EntityCatalog, HttpEntitySource};
use relayd::config::Config;
use relayd::executor::HttpServiceExecutor;
use relayd::orchestrator::Orchestrator;
use relayd::rpc_server::{self, DaemonState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("relayd v{} starting", relay_common::VERSION);

    let config = Arc::new(Config::load());
    config.validate()?;

    let source = Arc::new(HttpEntitySource::new(&config.catalog.source_url));
    let catalog = Arc::new(EntityCatalog::new(source));

    match catalog.refresh().await {
        Ok(count) => info!("entity catalog ready: {} entities", count),
        Err(e) => warn!("initial catalog refresh failed, starting empty: {}", e),
    }

    // Background refresh keeps the snapshot fresh without ever blocking an
    // utterance on a rebuild.
    let refresh_catalog = Arc::clone(&catalog);
    let refresh_secs = config.catalog.refresh_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = refresh_catalog.refresh().await {
                warn!("catalog refresh failed, keeping previous snapshot: {}", e);
            }
        }
    });

    let executor = Arc::new(HttpServiceExecutor::new(
        &config.execution.service_url,
        config.execution.timeout_secs,
    ));
    let primary = Arc::new(HttpAgent::new(
        &config.agents.primary_name,
        &config.agents.primary_url,
    ));
    let fallback = Arc::new(HttpAgent::new(
        &config.agents.fallback_name,
        &config.agents.fallback_url,
    ));

    let orchestrator = Orchestrator::new(Arc::clone(&catalog), executor, primary, fallback);
    let state = Arc::new(DaemonState::new(config, catalog, orchestrator));

    tokio::select! {
        result = rpc_server::start_server(state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
        }
    }

    Ok(())
}
