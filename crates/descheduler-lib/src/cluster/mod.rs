//! Cluster collaborators
//!
//! The strategy never talks to the API server directly. It reads cluster
//! state through [`ClusterReader`], issues evictions through
//! [`EvictionRequester`] and decides which nodes are off-limits through
//! [`NodeExclusion`]. [`KubeCluster`] backs the first two with a real
//! Kubernetes client.

mod kubernetes;
pub mod quantity;

pub use kubernetes::{node_from_k8s, workload_from_k8s, KubeCluster};

use crate::error::DeschedulerResult;
use crate::models::{Node, TaintEffect, Workload};

pub use async_trait::async_trait;

/// Legacy taint key marking master nodes
pub const MASTER_TAINT_KEY: &str = "node-role.kubernetes.io/master";

/// Taint key marking control-plane nodes
pub const CONTROL_PLANE_TAINT_KEY: &str = "node-role.kubernetes.io/control-plane";

/// Read access to cluster state
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// List the nodes the strategy may consider
    async fn list_nodes(&self) -> DeschedulerResult<Vec<Node>>;

    /// List the workloads currently bound to `node`
    async fn list_workloads(&self, node: &Node) -> DeschedulerResult<Vec<Workload>>;
}

/// Issues eviction requests for single workloads
#[async_trait]
pub trait EvictionRequester: Send + Sync {
    /// Returns `Ok(true)` when the eviction was accepted (or simulated in dry-run mode)
    async fn evict_workload(
        &self,
        workload: &Workload,
        policy_group_version: &str,
        dry_run: bool,
    ) -> DeschedulerResult<bool>;
}

/// Decides whether a node may never be picked as an eviction target
pub trait NodeExclusion: Send + Sync {
    fn is_excluded_from_selection(&self, node: &Node) -> bool;
}

/// Excludes tainted control-plane nodes and unschedulable nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlPlaneExclusion;

impl NodeExclusion for ControlPlaneExclusion {
    fn is_excluded_from_selection(&self, node: &Node) -> bool {
        node.unschedulable
            || node.has_taint(MASTER_TAINT_KEY, TaintEffect::NoSchedule)
            || node.has_taint(CONTROL_PLANE_TAINT_KEY, TaintEffect::NoSchedule)
    }
}
