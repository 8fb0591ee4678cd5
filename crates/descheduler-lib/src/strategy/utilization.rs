//! Node utilization calculation

use crate::models::{Node, NodeUtilization, ResourceName, Workload};
use std::collections::BTreeMap;

/// Percentage of `node`'s capacity requested by `workloads`, per resource
///
/// A zero-capacity dimension reports 0%. Values above 100 are kept as-is
/// for over-committed nodes.
pub fn node_utilization(node: &Node, workloads: &[Workload]) -> NodeUtilization {
    let percentages: BTreeMap<ResourceName, f64> = ResourceName::ALL
        .iter()
        .map(|&resource| {
            let used = match resource {
                ResourceName::Pods => workloads.len() as u64,
                _ => workloads
                    .iter()
                    .map(|w| w.requests.get(resource))
                    .fold(0u64, u64::saturating_add),
            };
            (resource, percent_of(used, node.capacity.get(resource)))
        })
        .collect();

    NodeUtilization {
        node_name: node.name.clone(),
        percentages,
    }
}

fn percent_of(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    used as f64 / capacity as f64 * 100.0
}
