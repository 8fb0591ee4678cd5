//! Eviction ordering
//!
//! The selected node is drained completely. Workloads are ordered so that
//! the ones demanding the largest share of a node go first: if a budget
//! cuts the drain short, the hardest pods to re-place have been moved while
//! free capacity elsewhere is still at its largest.
//!
//! The same "most requested" heuristic is exposed as a pure scoring
//! function so a placement scheduler can apply the same bias when
//! re-admitting evicted pods. Nothing is registered globally.

use crate::models::{Node, ResourceQuantities, Workload};
use std::cmp::Ordering;

/// Highest score returned by [`MostRequested::score_node`]
pub const MAX_NODE_SCORE: f64 = 10.0;

/// Ordering heuristic applied to eviction candidates
pub trait EvictionOrdering: Send + Sync {
    /// Demand score of `workload` relative to `capacity`; higher is evicted first
    fn score(&self, workload: &Workload, capacity: &ResourceQuantities) -> f64;

    /// Comparator placing higher-scoring workloads first, ties by key
    fn compare(&self, a: &Workload, b: &Workload, capacity: &ResourceQuantities) -> Ordering {
        self.score(b, capacity)
            .partial_cmp(&self.score(a, capacity))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key().cmp(&b.key()))
    }
}

/// Prefer the workloads (and nodes) with the most requested resources
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRequested;

impl MostRequested {
    pub fn new() -> Self {
        Self
    }

    /// Placement score of `node` for `incoming` given what is already requested on it
    ///
    /// Averages the post-placement CPU and memory request fraction, scaled to
    /// `0..=MAX_NODE_SCORE`. Fuller nodes score higher; a dimension the pod
    /// would overflow scores zero.
    pub fn score_node(
        &self,
        capacity: &ResourceQuantities,
        requested: &ResourceQuantities,
        incoming: &ResourceQuantities,
    ) -> f64 {
        let cpu = requested_score(
            requested.cpu_millis + incoming.cpu_millis,
            capacity.cpu_millis,
        );
        let memory = requested_score(
            requested.memory_bytes + incoming.memory_bytes,
            capacity.memory_bytes,
        );
        (cpu + memory) / 2.0
    }
}

fn requested_score(requested: u64, capacity: u64) -> f64 {
    if capacity == 0 || requested > capacity {
        return 0.0;
    }
    requested as f64 * MAX_NODE_SCORE / capacity as f64
}

fn fraction(requested: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    requested as f64 / capacity as f64
}

impl EvictionOrdering for MostRequested {
    fn score(&self, workload: &Workload, capacity: &ResourceQuantities) -> f64 {
        let cpu = fraction(workload.requests.cpu_millis, capacity.cpu_millis);
        let memory = fraction(workload.requests.memory_bytes, capacity.memory_bytes);
        (cpu + memory) / 2.0 * 100.0
    }
}

/// Produces the ordered eviction plan for a selected node
pub struct EvictionAdvisor<'o> {
    ordering: &'o dyn EvictionOrdering,
}

impl<'o> EvictionAdvisor<'o> {
    pub fn new(ordering: &'o dyn EvictionOrdering) -> Self {
        Self { ordering }
    }

    /// Every eligible workload on `node`, highest demand first
    pub fn plan(&self, node: &Node, workloads: &[Workload]) -> Vec<Workload> {
        let mut ordered = workloads.to_vec();
        ordered.sort_by(|a, b| self.ordering.compare(a, b, &node.capacity));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity() -> ResourceQuantities {
        ResourceQuantities::new(1000, 4000, 10)
    }

    #[test]
    fn test_plan_orders_by_descending_demand() {
        let node = Node::new("n1", capacity());
        let workloads = vec![
            Workload::new("small", "default", "n1", 100, 400),
            Workload::new("large", "default", "n1", 600, 2000),
            Workload::new("medium", "default", "n1", 300, 1000),
        ];

        let plan = EvictionAdvisor::new(&MostRequested).plan(&node, &workloads);
        let names: Vec<&str> = plan.iter().map(|w| w.name.as_str()).collect();

        assert_eq!(names, vec!["large", "medium", "small"]);
    }

    #[test]
    fn test_plan_keeps_every_workload() {
        let node = Node::new("n1", capacity());
        let workloads: Vec<Workload> = (0..5)
            .map(|i| Workload::new(format!("p{}", i), "default", "n1", 100, 100))
            .collect();

        let plan = EvictionAdvisor::new(&MostRequested).plan(&node, &workloads);
        assert_eq!(plan.len(), 5);
        // equal demand falls back to key order
        assert_eq!(plan[0].name, "p0");
        assert_eq!(plan[4].name, "p4");
    }

    #[test]
    fn test_empty_plan() {
        let node = Node::new("n1", capacity());
        assert!(EvictionAdvisor::new(&MostRequested).plan(&node, &[]).is_empty());
    }

    #[test]
    fn test_workload_score() {
        let pod = Workload::new("p", "default", "n1", 500, 1000);
        // cpu 50%, memory 25%
        assert!((MostRequested.score(&pod, &capacity()) - 37.5).abs() < 1e-9);
        assert_eq!(MostRequested.score(&pod, &ResourceQuantities::default()), 0.0);
    }

    #[test]
    fn test_score_node_prefers_fuller_nodes() {
        let incoming = ResourceQuantities::new(100, 400, 0);
        let empty = ResourceQuantities::default();
        let busy = ResourceQuantities::new(700, 2000, 0);

        let empty_score = MostRequested.score_node(&capacity(), &empty, &incoming);
        let busy_score = MostRequested.score_node(&capacity(), &busy, &incoming);

        assert!(busy_score > empty_score);
        assert!(busy_score <= MAX_NODE_SCORE);
        // (800/1000 * 10 + 2400/4000 * 10) / 2
        assert!((busy_score - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_node_overflow_scores_zero() {
        let incoming = ResourceQuantities::new(500, 0, 0);
        let busy = ResourceQuantities::new(800, 0, 0);
        assert_eq!(MostRequested.score_node(&capacity(), &busy, &incoming), 0.0);
    }
}
