//! In-memory cluster used by unit tests

use crate::cluster::{async_trait, ClusterReader, EvictionRequester};
use crate::error::{DeschedulerError, DeschedulerResult};
use crate::models::{Node, Workload};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeCluster {
    nodes: Vec<Node>,
    workloads: Mutex<Vec<Workload>>,
    failing_listings: HashSet<String>,
    unfiltered_listings: HashSet<String>,
    failing_evictions: HashSet<String>,
    refused_evictions: HashSet<String>,
    hanging_evictions: HashSet<String>,
    hanging_listings: HashSet<String>,
    eviction_calls: Mutex<Vec<String>>,
    listing_calls: Mutex<usize>,
    last_group_version: Mutex<Option<String>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_workload(self, workload: Workload) -> Self {
        self.workloads.lock().unwrap().push(workload);
        self
    }

    pub fn fail_listing_for(mut self, node: &str) -> Self {
        self.failing_listings.insert(node.to_string());
        self
    }

    /// Listing this node returns every workload, regardless of binding
    pub fn list_everything_for(mut self, node: &str) -> Self {
        self.unfiltered_listings.insert(node.to_string());
        self
    }

    /// Listing this node never completes
    pub fn hang_listing_for(mut self, node: &str) -> Self {
        self.hanging_listings.insert(node.to_string());
        self
    }

    pub fn fail_eviction_for(mut self, pod: &str) -> Self {
        self.failing_evictions.insert(pod.to_string());
        self
    }

    pub fn refuse_eviction_for(mut self, pod: &str) -> Self {
        self.refused_evictions.insert(pod.to_string());
        self
    }

    pub fn hang_eviction_for(mut self, pod: &str) -> Self {
        self.hanging_evictions.insert(pod.to_string());
        self
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    pub fn eviction_calls(&self) -> Vec<String> {
        self.eviction_calls.lock().unwrap().clone()
    }

    pub fn listing_calls(&self) -> usize {
        *self.listing_calls.lock().unwrap()
    }

    pub fn last_policy_group_version(&self) -> Option<String> {
        self.last_group_version.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterReader for FakeCluster {
    async fn list_nodes(&self) -> DeschedulerResult<Vec<Node>> {
        Ok(self.nodes.clone())
    }

    async fn list_workloads(&self, node: &Node) -> DeschedulerResult<Vec<Workload>> {
        *self.listing_calls.lock().unwrap() += 1;

        if self.hanging_listings.contains(&node.name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        if self.failing_listings.contains(&node.name) {
            return Err(DeschedulerError::Listing {
                target: format!("pods on node {}", node.name),
                message: "connection refused".to_string(),
            });
        }

        let workloads = self.workloads.lock().unwrap();
        Ok(workloads
            .iter()
            .filter(|w| self.unfiltered_listings.contains(&node.name) || w.node_name == node.name)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EvictionRequester for FakeCluster {
    async fn evict_workload(
        &self,
        workload: &Workload,
        policy_group_version: &str,
        dry_run: bool,
    ) -> DeschedulerResult<bool> {
        self.eviction_calls.lock().unwrap().push(workload.key());
        *self.last_group_version.lock().unwrap() = Some(policy_group_version.to_string());

        if self.hanging_evictions.contains(&workload.name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing_evictions.contains(&workload.name) {
            return Err(DeschedulerError::Eviction {
                pod: workload.key(),
                message: "pods \"not found\"".to_string(),
            });
        }
        if self.refused_evictions.contains(&workload.name) {
            return Ok(false);
        }

        if !dry_run {
            self.workloads
                .lock()
                .unwrap()
                .retain(|w| w.key() != workload.key());
        }
        Ok(true)
    }
}
