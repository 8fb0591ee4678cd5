//! Node-workload index
//!
//! Groups the evictable workloads of a run by the node they are bound to.
//! A failed listing for one node leaves that node with an empty workload
//! set instead of aborting the whole build.

use super::report::ListingFailure;
use crate::cluster::ClusterReader;
use crate::context::RunContext;
use crate::models::{Node, Workload};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Which workloads count as evictable
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityFilter {
    /// Admit workloads that mount node-local storage
    pub include_local_storage: bool,
}

impl EligibilityFilter {
    pub fn new(include_local_storage: bool) -> Self {
        Self {
            include_local_storage,
        }
    }

    /// Why `workload` is not evictable, or `None` if it is
    pub fn rejection_reason(&self, workload: &Workload) -> Option<&'static str> {
        if !workload.has_owner {
            return Some("no owner reference");
        }
        if workload.is_mirror {
            return Some("mirror pod");
        }
        if workload.is_daemon_set {
            return Some("daemonset pod");
        }
        if workload.uses_local_storage && !self.include_local_storage {
            return Some("uses local storage");
        }
        None
    }

    pub fn is_eligible(&self, workload: &Workload) -> bool {
        self.rejection_reason(workload).is_none()
    }
}

/// One node and the eligible workloads bound to it
#[derive(Debug, Clone)]
pub struct NodeWorkloads {
    pub node: Node,
    pub workloads: Vec<Workload>,
    /// Workloads on the node that failed the eligibility filter
    pub excluded: usize,
}

/// Per-run mapping from node to its eligible workloads
#[derive(Debug, Clone, Default)]
pub struct NodeWorkloadIndex {
    entries: Vec<NodeWorkloads>,
    listing_failures: Vec<ListingFailure>,
}

impl NodeWorkloadIndex {
    /// List the workloads of every node and keep the eligible ones
    pub async fn build(
        reader: &dyn ClusterReader,
        nodes: &[Node],
        filter: EligibilityFilter,
        ctx: &mut RunContext,
    ) -> Self {
        let mut index = Self::default();
        let mut seen = HashSet::new();

        for node in nodes {
            let listed = match ctx.guard(reader.list_workloads(node)).await {
                Ok(Ok(workloads)) => workloads,
                Ok(Err(e)) => {
                    warn!(node = %node.name, error = %e, "Failed to list pods on node");
                    index.record_failure(&node.name, e.to_string());
                    Vec::new()
                }
                Err(interruption) => {
                    warn!(node = %node.name, reason = %interruption, "Pod listing interrupted");
                    index.record_failure(&node.name, interruption.to_string());
                    Vec::new()
                }
            };

            let mut workloads = Vec::with_capacity(listed.len());
            let mut excluded = 0;

            for workload in listed {
                if workload.node_name != node.name || !seen.insert(workload.key()) {
                    debug!(pod = %workload.key(), node = %node.name, "Ignoring pod not bound to this node");
                    continue;
                }
                match filter.rejection_reason(&workload) {
                    None => workloads.push(workload),
                    Some(reason) => {
                        debug!(pod = %workload.key(), node = %node.name, reason, "Pod is not evictable");
                        excluded += 1;
                    }
                }
            }

            index.entries.push(NodeWorkloads {
                node: node.clone(),
                workloads,
                excluded,
            });
        }

        index
    }

    /// Build directly from already-grouped data
    pub fn from_entries(entries: Vec<NodeWorkloads>) -> Self {
        Self {
            entries,
            listing_failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, node_name: &str, cause: String) {
        self.listing_failures.push(ListingFailure {
            target: node_name.to_string(),
            cause,
        });
    }

    pub fn entries(&self) -> &[NodeWorkloads] {
        &self.entries
    }

    pub fn get(&self, node_name: &str) -> Option<&NodeWorkloads> {
        self.entries.iter().find(|e| e.node.name == node_name)
    }

    pub fn listing_failures(&self) -> &[ListingFailure] {
        &self.listing_failures
    }

    pub fn take_listing_failures(&mut self) -> Vec<ListingFailure> {
        std::mem::take(&mut self.listing_failures)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
