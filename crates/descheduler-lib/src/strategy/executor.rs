//! Eviction execution
//!
//! Walks the ordered plan, calling the eviction requester once per
//! workload. A failed eviction never stops the walk; only the optional
//! per-node budget or an interrupted [`RunContext`] leaves workloads
//! unattempted, and those are counted as skipped. An eviction cut off
//! while in flight counts as attempted and failed, since the API server
//! may already have acted on it.

use super::report::{EvictionFailure, EvictionReport};
use crate::cluster::EvictionRequester;
use crate::context::RunContext;
use crate::models::Workload;
use crate::observability::StructuredLogger;
use tracing::debug;

/// Drives the eviction requester over an ordered workload plan
pub struct EvictionExecutor<'a> {
    requester: &'a dyn EvictionRequester,
    policy_group_version: &'a str,
    max_evictions: Option<usize>,
    logger: StructuredLogger,
}

impl<'a> EvictionExecutor<'a> {
    pub fn new(requester: &'a dyn EvictionRequester, policy_group_version: &'a str) -> Self {
        Self {
            requester,
            policy_group_version,
            max_evictions: None,
            logger: StructuredLogger::new(super::STRATEGY_NAME),
        }
    }

    /// Attempt at most `max` evictions
    pub fn with_budget(mut self, max: Option<usize>) -> Self {
        self.max_evictions = max;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Evict `ordered` in order and aggregate the outcomes
    pub async fn evict(
        &self,
        ordered: &[Workload],
        dry_run: bool,
        ctx: &mut RunContext,
    ) -> EvictionReport {
        let mut report = EvictionReport::empty(dry_run);
        let budget = self.max_evictions.unwrap_or(usize::MAX);

        for (position, workload) in ordered.iter().enumerate() {
            if position >= budget {
                debug!(
                    budget = budget,
                    remaining = ordered.len() - position,
                    "Per-node eviction budget reached"
                );
                report.skipped += ordered.len() - position;
                break;
            }

            if let Some(interruption) = ctx.interruption() {
                debug!(reason = %interruption, "Run interrupted before eviction");
                report.aborted = true;
                report.skipped += ordered.len() - position;
                break;
            }

            let outcome = ctx
                .guard(self.requester.evict_workload(
                    workload,
                    self.policy_group_version,
                    dry_run,
                ))
                .await;

            let cause = match outcome {
                Ok(Ok(true)) => None,
                Ok(Ok(false)) => Some("eviction refused".to_string()),
                Ok(Err(e)) => Some(e.to_string()),
                Err(interruption) => {
                    debug!(pod = %workload.key(), reason = %interruption, "Eviction interrupted");
                    report.aborted = true;
                    report.skipped += ordered.len() - position - 1;
                    Some(interruption.to_string())
                }
            };

            report.attempted += 1;
            match cause {
                None => {
                    report.succeeded += 1;
                    report.evicted.push(workload.key());
                    self.logger
                        .log_pod_evicted(&workload.key(), &workload.node_name, dry_run);
                }
                Some(cause) => {
                    report.failed += 1;
                    self.logger
                        .log_pod_eviction_failed(&workload.key(), &workload.node_name, &cause);
                    report.failures.push(EvictionFailure {
                        pod: workload.name.clone(),
                        namespace: workload.namespace.clone(),
                        cause,
                    });
                }
            }

            if report.aborted {
                break;
            }
        }

        report
    }
}
