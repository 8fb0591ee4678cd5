//! Bin-packing descheduler
//!
//! Periodically evicts every pod from the least utilized node under the
//! configured thresholds, so the scheduler can pack them onto fewer nodes.

use anyhow::{Context, Result};
use clap::Parser;
use descheduler::{
    api,
    runner::DeschedulerRunner,
    settings::{Cli, DeschedulerPolicy, LogFormat},
};
use descheduler_lib::{
    cluster::KubeCluster,
    health::{components, HealthRegistry},
    observability::DeschedulerMetrics,
    strategy::BinPackingStrategy,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DESCHEDULER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!(version = DESCHEDULER_VERSION, "Starting descheduler");

    let policy = DeschedulerPolicy::resolve(&cli)?;
    info!(
        dry_run = policy.bin_packing.dry_run,
        enabled = policy.bin_packing.enabled,
        interval_secs = policy.descheduling_interval_secs,
        timeout_secs = policy.timeout_secs,
        "Descheduler configured"
    );

    let mut cluster = match &cli.kubeconfig {
        Some(path) => KubeCluster::from_kubeconfig(path).await,
        None => KubeCluster::try_default().await,
    }
    .context("failed to create Kubernetes client")?;
    if let Some(selector) = &policy.node_selector {
        cluster = cluster.with_node_selector(selector.clone());
    }
    let cluster = Arc::new(cluster);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_READER).await;
    health_registry.register(components::EVICTOR).await;

    let metrics = DeschedulerMetrics::new();
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(cli.api_port, app_state));

    let (shutdown_tx, _) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received, shutting down");
            let _ = signal_tx.send(());
        }
    });

    let strategy = BinPackingStrategy::new(cluster.clone(), cluster.clone());
    let runner = DeschedulerRunner::new(cluster, strategy, policy, health_registry.clone());

    health_registry.set_ready(true).await;

    let result = runner.run(shutdown_tx).await;
    api_handle.abort();

    if let Err(e) = &result {
        error!(error = %e, "Descheduler stopped");
    }
    info!("Shutting down");

    result?;
    Ok(())
}
