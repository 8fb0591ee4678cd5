//! Strategy run outcome

use serde::{Deserialize, Serialize};

/// A listing call that failed during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFailure {
    /// Node name, or `nodes` for the cluster-wide node listing
    pub target: String,
    pub cause: String,
}

/// A workload whose eviction failed or was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionFailure {
    pub pod: String,
    pub namespace: String,
    pub cause: String,
}

/// Aggregate result of one bin-packing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvictionReport {
    /// Node chosen for draining; `None` means nothing to do
    pub target_node: Option<String>,
    pub dry_run: bool,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Not attempted because of the per-node budget or an interruption
    pub skipped: usize,
    /// Keys (`namespace/name`) of evicted workloads, in eviction order
    pub evicted: Vec<String>,
    pub failures: Vec<EvictionFailure>,
    pub listing_failures: Vec<ListingFailure>,
    /// Deadline or shutdown stopped the run early
    pub aborted: bool,
}

impl EvictionReport {
    pub fn empty(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// No failures of any kind were recorded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.listing_failures.is_empty() && !self.aborted
    }
}
