//! Bin-packing descheduling strategy
//!
//! Finds the least utilized node under the configured thresholds and evicts
//! every eligible pod on it, so the scheduler can pack that work onto the
//! remaining nodes. One run is:
//!
//! 1. build the [`NodeWorkloadIndex`] from the cluster reader
//! 2. compute per-node utilization and select the target
//! 3. order the target's pods with the eviction advisor
//! 4. evict them and aggregate an [`EvictionReport`]

mod advisor;
mod executor;
mod index;
mod report;
mod selector;
mod utilization;


pub use advisor::{EvictionAdvisor, EvictionOrdering, MostRequested, MAX_NODE_SCORE};
pub use executor::EvictionExecutor;
pub use index::{EligibilityFilter, NodeWorkloadIndex, NodeWorkloads};
pub use report::{EvictionFailure, EvictionReport, ListingFailure};
pub use selector::{is_under_ceiling, select_least_utilized_under_threshold, SelectedNode};
pub use utilization::node_utilization;

use crate::cluster::{ClusterReader, ControlPlaneExclusion, EvictionRequester, NodeExclusion};
use crate::config::DeschedulerStrategy;
use crate::context::RunContext;
use crate::error::DeschedulerResult;
use crate::models::Node;
use crate::observability::{DeschedulerMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Name under which the strategy logs and is configured
pub const STRATEGY_NAME: &str = "BinPacking";

/// The bin-packing strategy and the collaborators it runs against
#[derive(Clone)]
pub struct BinPackingStrategy {
    reader: Arc<dyn ClusterReader>,
    evictor: Arc<dyn EvictionRequester>,
    exclusion: Arc<dyn NodeExclusion>,
    ordering: Arc<dyn EvictionOrdering>,
    metrics: DeschedulerMetrics,
    logger: StructuredLogger,
}

impl BinPackingStrategy {
    /// Strategy with control-plane exclusion and most-requested ordering
    pub fn new(reader: Arc<dyn ClusterReader>, evictor: Arc<dyn EvictionRequester>) -> Self {
        Self {
            reader,
            evictor,
            exclusion: Arc::new(ControlPlaneExclusion),
            ordering: Arc::new(MostRequested),
            metrics: DeschedulerMetrics::new(),
            logger: StructuredLogger::new(STRATEGY_NAME),
        }
    }

    pub fn with_exclusion(mut self, exclusion: Arc<dyn NodeExclusion>) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn with_ordering(mut self, ordering: Arc<dyn EvictionOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    /// Run the strategy once over `nodes`
    ///
    /// Only an invalid configuration is returned as an error. Listing and
    /// eviction failures, an empty selection and interruptions are all
    /// reported through the returned [`EvictionReport`].
    pub async fn run_bin_packing_strategy(
        &self,
        config: &DeschedulerStrategy,
        nodes: &[Node],
        ctx: &mut RunContext,
    ) -> DeschedulerResult<EvictionReport> {
        if !config.enabled {
            debug!(strategy = STRATEGY_NAME, "Strategy disabled, skipping");
            return Ok(EvictionReport::empty(config.dry_run));
        }
        config.validate()?;

        let started = Instant::now();
        self.logger.log_strategy_started(nodes.len(), config.dry_run);

        let mut index = NodeWorkloadIndex::build(
            self.reader.as_ref(),
            nodes,
            EligibilityFilter::new(config.evict_local_storage_pods),
            ctx,
        )
        .await;

        let listing_failures = index.take_listing_failures();
        for failure in &listing_failures {
            self.logger.log_listing_failed(&failure.target, &failure.cause);
        }

        let selected = select_least_utilized_under_threshold(
            &index,
            &config.thresholds,
            self.exclusion.as_ref(),
        );

        let mut report = match selected {
            None => {
                self.logger.log_no_underutilized_node();
                EvictionReport::empty(config.dry_run)
            }
            Some(selected) => {
                self.metrics.set_selected_node_utilization(&selected.utilization);

                let plan = EvictionAdvisor::new(self.ordering.as_ref())
                    .plan(&selected.entry.node, &selected.entry.workloads);
                self.logger.log_node_selected(&selected.utilization, plan.len());

                let mut report = EvictionExecutor::new(
                    self.evictor.as_ref(),
                    &config.policy_group_version,
                )
                .with_budget(config.max_pods_to_evict_per_node)
                .with_logger(self.logger.clone())
                .evict(&plan, config.dry_run, ctx)
                .await;

                report.target_node = Some(selected.entry.node.name.clone());
                report
            }
        };

        report.listing_failures = listing_failures;
        report.aborted |= ctx.is_interrupted();

        self.metrics
            .observe_run(started.elapsed().as_secs_f64(), &report);
        self.logger.log_strategy_finished(&report);

        Ok(report)
    }
}
