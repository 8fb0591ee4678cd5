//! Descheduling control loop
//!
//! Lists the nodes, runs the bin-packing strategy and folds the outcome into
//! health and metrics, once or every `descheduling_interval_secs`.

use crate::settings::DeschedulerPolicy;
use descheduler_lib::cluster::ClusterReader;
use descheduler_lib::health::{components, HealthRegistry};
use descheduler_lib::observability::{DeschedulerMetrics, StructuredLogger};
use descheduler_lib::strategy::{BinPackingStrategy, EvictionReport, ListingFailure, STRATEGY_NAME};
use descheduler_lib::{DeschedulerResult, RunContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Runs the strategy against the cluster on the configured schedule
pub struct DeschedulerRunner {
    reader: Arc<dyn ClusterReader>,
    strategy: BinPackingStrategy,
    policy: DeschedulerPolicy,
    health: HealthRegistry,
    metrics: DeschedulerMetrics,
    logger: StructuredLogger,
}

impl DeschedulerRunner {
    pub fn new(
        reader: Arc<dyn ClusterReader>,
        strategy: BinPackingStrategy,
        policy: DeschedulerPolicy,
        health: HealthRegistry,
    ) -> Self {
        Self {
            reader,
            strategy,
            policy,
            health,
            metrics: DeschedulerMetrics::new(),
            logger: StructuredLogger::new(STRATEGY_NAME),
        }
    }

    /// One descheduling cycle bounded by the policy timeout
    ///
    /// A disabled strategy makes the cycle a no-op that never touches the
    /// cluster. A failed node listing ends the cycle with a report carrying
    /// the failure and marks the cluster reader unhealthy; only an invalid
    /// strategy configuration is an error.
    pub async fn run_once(
        &self,
        shutdown: broadcast::Receiver<()>,
    ) -> DeschedulerResult<EvictionReport> {
        let dry_run = self.policy.bin_packing.dry_run;
        if !self.policy.bin_packing.enabled {
            debug!(strategy = STRATEGY_NAME, "Strategy disabled, skipping cycle");
            return Ok(EvictionReport::empty(dry_run));
        }

        let mut ctx = RunContext::new()
            .with_timeout(Duration::from_secs(self.policy.timeout_secs))
            .with_shutdown(shutdown);

        let mut nodes_unavailable = None;
        let report = match ctx.guard(self.reader.list_nodes()).await {
            Ok(Ok(nodes)) => {
                self.strategy
                    .run_bin_packing_strategy(&self.policy.bin_packing, &nodes, &mut ctx)
                    .await?
            }
            Ok(Err(e)) => {
                self.logger.log_listing_failed("nodes", &e.to_string());
                self.metrics.inc_listing_failures();
                let mut report = EvictionReport::empty(dry_run);
                report.listing_failures.push(ListingFailure {
                    target: "nodes".to_string(),
                    cause: e.to_string(),
                });
                nodes_unavailable = Some(e.to_string());
                report
            }
            Err(interruption) => {
                debug!(reason = %interruption, "Node listing interrupted");
                let mut report = EvictionReport::empty(dry_run);
                report.aborted = true;
                report
            }
        };

        self.health.record_run(&report).await;
        if let Some(cause) = nodes_unavailable {
            self.health
                .set_unhealthy(components::CLUSTER_READER, format!("node listing failed: {}", cause))
                .await;
        }
        Ok(report)
    }

    /// Run cycles until shutdown, or a single cycle when no interval is set
    pub async fn run(&self, shutdown: broadcast::Sender<()>) -> DeschedulerResult<()> {
        let mut stop = shutdown.subscribe();
        let interval = Duration::from_secs(self.policy.descheduling_interval_secs);

        loop {
            let report = self.run_once(shutdown.subscribe()).await?;
            if report.aborted {
                info!(node = ?report.target_node, "Descheduling cycle aborted");
            }

            if interval.is_zero() {
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.recv() => {
                    info!("Descheduling loop stopped");
                    return Ok(());
                }
            }
        }
    }
}
