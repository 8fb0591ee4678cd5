//! Target node selection
//!
//! Picks the least utilized node that is strictly under the configured
//! thresholds. Utilization is computed for every node first, then a single
//! fold walks the results carrying a running ceiling: each accepted node
//! replaces the ceiling with its own utilization on the configured
//! dimensions, so a later node is only accepted if it is strictly lower on
//! all of them.
//!
//! Nodes that are exactly tied, or that are lower on some dimensions and
//! higher on others, are resolved by index order: the first node found that
//! beats every earlier candidate wins. This is accepted behaviour.

use super::index::{NodeWorkloadIndex, NodeWorkloads};
use super::utilization::node_utilization;
use crate::cluster::NodeExclusion;
use crate::models::{NodeUtilization, ResourceThresholds};
use tracing::{debug, trace};

/// Node chosen for draining, with the utilization that won it the spot
#[derive(Debug, Clone)]
pub struct SelectedNode<'a> {
    pub entry: &'a NodeWorkloads,
    pub utilization: NodeUtilization,
}

/// True when `usage` is strictly below `ceiling` on every dimension in `ceiling`
///
/// Dimensions absent from `ceiling` are not compared.
pub fn is_under_ceiling(usage: &NodeUtilization, ceiling: &ResourceThresholds) -> bool {
    ceiling
        .iter()
        .all(|(resource, limit)| usage.get(resource) < limit)
}

/// Narrow `ceiling` to `usage`, keeping only the dimensions it already has
fn tighten(ceiling: &ResourceThresholds, usage: &NodeUtilization) -> ResourceThresholds {
    ceiling
        .iter()
        .map(|(resource, _)| (resource, usage.get(resource)))
        .collect()
}

/// Least utilized selectable node under `thresholds`, or `None` when no node qualifies
///
/// `thresholds` is never modified; the running ceiling is a local copy.
pub fn select_least_utilized_under_threshold<'a>(
    index: &'a NodeWorkloadIndex,
    thresholds: &ResourceThresholds,
    exclusion: &dyn NodeExclusion,
) -> Option<SelectedNode<'a>> {
    let usages: Vec<(&NodeWorkloads, NodeUtilization)> = index
        .entries()
        .iter()
        .filter(|entry| {
            let excluded = exclusion.is_excluded_from_selection(&entry.node);
            if excluded {
                debug!(node = %entry.node.name, "Node excluded from selection");
            }
            !excluded
        })
        .map(|entry| (entry, node_utilization(&entry.node, &entry.workloads)))
        .collect();

    let (_, selected) = usages.into_iter().fold(
        (thresholds.clone(), None),
        |(ceiling, best): (ResourceThresholds, Option<SelectedNode<'a>>), (entry, usage)| {
            trace!(node = %entry.node.name, usage = ?usage.percentages, "Evaluating node");
            if is_under_ceiling(&usage, &ceiling) {
                let ceiling = tighten(&ceiling, &usage);
                (
                    ceiling,
                    Some(SelectedNode {
                        entry,
                        utilization: usage,
                    }),
                )
            } else {
                (ceiling, best)
            }
        },
    );

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ControlPlaneExclusion, MASTER_TAINT_KEY};
    use crate::models::{Node, ResourceName, ResourceQuantities, Taint, TaintEffect, Workload};

    fn thresholds(cpu: f64, pods: f64) -> ResourceThresholds {
        ResourceThresholds::new()
            .with(ResourceName::Cpu, cpu)
            .with(ResourceName::Pods, pods)
    }

    fn entry(node: Node, cpu_per_pod: u64, pods: usize) -> NodeWorkloads {
        let workloads = (0..pods)
            .map(|i| Workload::new(format!("{}-p{}", node.name, i), "default", node.name.clone(), cpu_per_pod, 0))
            .collect();
        NodeWorkloads {
            node,
            workloads,
            excluded: 0,
        }
    }

    fn worker(name: &str) -> Node {
        Node::new(name, ResourceQuantities::new(1000, 3000, 10))
    }

    fn selected_name(index: &NodeWorkloadIndex, limits: &ResourceThresholds) -> Option<String> {
        select_least_utilized_under_threshold(index, limits, &ControlPlaneExclusion)
            .map(|s| s.entry.node.name.clone())
    }

    #[test]
    fn test_under_ceiling_is_strict() {
        let usage = NodeUtilization {
            node_name: "n".to_string(),
            percentages: [(ResourceName::Cpu, 70.0), (ResourceName::Pods, 10.0)]
                .into_iter()
                .collect(),
        };

        assert!(!is_under_ceiling(&usage, &thresholds(70.0, 20.0)));
        assert!(is_under_ceiling(&usage, &thresholds(70.1, 20.0)));
        // unconfigured dimensions are not compared
        assert!(is_under_ceiling(&usage, &ResourceThresholds::new().with(ResourceName::Pods, 20.0)));
    }

    #[test]
    fn test_lowest_node_wins_in_every_order() {
        let lo = entry(worker("n_lo"), 300, 1);
        let mid = entry(worker("n_mid"), 300, 2);
        let hi = entry(worker("n_hi"), 300, 3);

        let orders = [
            vec![lo.clone(), mid.clone(), hi.clone()],
            vec![mid.clone(), lo.clone(), hi.clone()],
            vec![hi.clone(), mid.clone(), lo.clone()],
            vec![mid.clone(), hi.clone(), lo.clone()],
        ];

        for order in orders {
            let index = NodeWorkloadIndex::from_entries(order);
            assert_eq!(
                selected_name(&index, &thresholds(70.0, 40.0)).as_deref(),
                Some("n_lo")
            );
        }
    }

    #[test]
    fn test_no_node_under_threshold() {
        let index = NodeWorkloadIndex::from_entries(vec![
            entry(worker("a"), 800, 1),
            entry(worker("b"), 400, 2),
        ]);

        assert_eq!(selected_name(&index, &thresholds(70.0, 40.0)), None);
    }

    #[test]
    fn test_excluded_node_is_never_selected() {
        let master = worker("master")
            .with_taint(Taint::new(MASTER_TAINT_KEY, TaintEffect::NoSchedule));
        let index = NodeWorkloadIndex::from_entries(vec![
            entry(master, 0, 0),
            entry(worker("busy"), 300, 2),
        ]);

        assert_eq!(
            selected_name(&index, &thresholds(70.0, 40.0)).as_deref(),
            Some("busy")
        );
    }

    #[test]
    fn test_caller_thresholds_are_untouched() {
        let limits = thresholds(70.0, 40.0);
        let before = limits.clone();
        let index = NodeWorkloadIndex::from_entries(vec![entry(worker("a"), 100, 1)]);

        let selected = select_least_utilized_under_threshold(&index, &limits, &ControlPlaneExclusion)
            .unwrap();

        assert_eq!(limits, before);
        assert!((selected.utilization.get(ResourceName::Cpu) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_tie_keeps_first_found() {
        let index = NodeWorkloadIndex::from_entries(vec![
            entry(worker("first"), 200, 1),
            entry(worker("second"), 200, 1),
        ]);

        assert_eq!(
            selected_name(&index, &thresholds(70.0, 40.0)).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_unconfigured_dimension_does_not_block_tightening() {
        // "heavy_mem" is lower on cpu and pods but higher on memory
        let light = entry(worker("light_mem"), 200, 2);
        let mut heavy = entry(worker("heavy_mem"), 100, 1);
        heavy.workloads[0].requests.memory_bytes = 2000;

        let index = NodeWorkloadIndex::from_entries(vec![light, heavy]);
        assert_eq!(
            selected_name(&index, &thresholds(70.0, 40.0)).as_deref(),
            Some("heavy_mem")
        );
    }
}
