//! Observability infrastructure for the descheduler
//!
//! Provides:
//! - Prometheus metrics (runs, evictions, failures, run duration, selected node utilization)
//! - Structured logging with tracing

use crate::models::NodeUtilization;
use crate::strategy::EvictionReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for strategy run duration (in seconds)
const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DeschedulerMetricsInner> = OnceLock::new();

struct DeschedulerMetricsInner {
    strategy_runs: IntGauge,
    strategy_duration_seconds: Histogram,
    pods_evicted: IntGauge,
    eviction_failures: IntGauge,
    listing_failures: IntGauge,
    selected_node_utilization: GaugeVec,
}

impl DeschedulerMetricsInner {
    fn new() -> Self {
        Self {
            strategy_runs: register_int_gauge!(
                "descheduler_strategy_runs_total",
                "Total number of bin-packing strategy runs"
            )
            .expect("Failed to register strategy_runs_total"),

            strategy_duration_seconds: register_histogram!(
                "descheduler_strategy_duration_seconds",
                "Wall-clock time of a bin-packing strategy run",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register strategy_duration_seconds"),

            pods_evicted: register_int_gauge!(
                "descheduler_pods_evicted_total",
                "Total number of pods evicted (or simulated in dry-run mode)"
            )
            .expect("Failed to register pods_evicted_total"),

            eviction_failures: register_int_gauge!(
                "descheduler_pod_eviction_failures_total",
                "Total number of failed or refused pod evictions"
            )
            .expect("Failed to register pod_eviction_failures_total"),

            listing_failures: register_int_gauge!(
                "descheduler_listing_failures_total",
                "Total number of failed node or pod listings"
            )
            .expect("Failed to register listing_failures_total"),

            selected_node_utilization: register_gauge_vec!(
                "descheduler_selected_node_utilization_percent",
                "Utilization of the node most recently selected for draining",
                &["resource"]
            )
            .expect("Failed to register selected_node_utilization_percent"),
        }
    }
}

/// Handle to the process-wide descheduler metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct DeschedulerMetrics {
    _private: (),
}

impl Default for DeschedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeschedulerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DeschedulerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DeschedulerMetricsInner {
        GLOBAL_METRICS.get_or_init(DeschedulerMetricsInner::new)
    }

    /// Record a finished run and its outcome counts
    pub fn observe_run(&self, duration_secs: f64, report: &EvictionReport) {
        let inner = self.inner();
        inner.strategy_runs.inc();
        inner.strategy_duration_seconds.observe(duration_secs);
        inner.pods_evicted.add(report.succeeded as i64);
        inner.eviction_failures.add(report.failed as i64);
        inner.listing_failures.add(report.listing_failures.len() as i64);
    }

    pub fn inc_listing_failures(&self) {
        self.inner().listing_failures.inc();
    }

    pub fn set_selected_node_utilization(&self, utilization: &NodeUtilization) {
        let gauge = &self.inner().selected_node_utilization;
        for (resource, percent) in &utilization.percentages {
            gauge.with_label_values(&[resource.as_str()]).set(*percent);
        }
    }

    pub fn pods_evicted_total(&self) -> i64 {
        self.inner().pods_evicted.get()
    }

    pub fn strategy_runs_total(&self) -> i64 {
        self.inner().strategy_runs.get()
    }
}

/// Structured logger for descheduler events
///
/// Every event carries a stable `event` field for log-based alerting.
#[derive(Clone)]
pub struct StructuredLogger {
    strategy: String,
}

impl StructuredLogger {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
        }
    }

    pub fn log_strategy_started(&self, nodes: usize, dry_run: bool) {
        info!(
            event = "strategy_started",
            strategy = %self.strategy,
            nodes = nodes,
            dry_run = dry_run,
            "Running descheduling strategy"
        );
    }

    pub fn log_node_selected(&self, utilization: &NodeUtilization, candidates: usize) {
        info!(
            event = "node_selected",
            strategy = %self.strategy,
            node = %utilization.node_name,
            usage = ?utilization.percentages,
            pods_to_evict = candidates,
            "Selected least utilized node for draining"
        );
    }

    pub fn log_no_underutilized_node(&self) {
        info!(
            event = "no_underutilized_node",
            strategy = %self.strategy,
            "No node is underutilized, nothing to do here, you might want to lower your thresholds"
        );
    }

    pub fn log_pod_evicted(&self, pod: &str, node: &str, dry_run: bool) {
        info!(
            event = "pod_evicted",
            strategy = %self.strategy,
            pod = %pod,
            node = %node,
            dry_run = dry_run,
            "Evicted pod"
        );
    }

    pub fn log_pod_eviction_failed(&self, pod: &str, node: &str, cause: &str) {
        warn!(
            event = "pod_eviction_failed",
            strategy = %self.strategy,
            pod = %pod,
            node = %node,
            cause = %cause,
            "Failed to evict pod"
        );
    }

    pub fn log_listing_failed(&self, target: &str, cause: &str) {
        warn!(
            event = "listing_failed",
            strategy = %self.strategy,
            target = %target,
            cause = %cause,
            "Listing failed, continuing without it"
        );
    }

    pub fn log_strategy_finished(&self, report: &EvictionReport) {
        if report.is_clean() {
            info!(
                event = "strategy_finished",
                strategy = %self.strategy,
                node = ?report.target_node,
                succeeded = report.succeeded,
                skipped = report.skipped,
                dry_run = report.dry_run,
                "Descheduling strategy finished"
            );
        } else {
            warn!(
                event = "strategy_finished",
                strategy = %self.strategy,
                node = ?report.target_node,
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                listing_failures = report.listing_failures.len(),
                aborted = report.aborted,
                dry_run = report.dry_run,
                "Descheduling strategy finished with failures"
            );
        }
    }
}
