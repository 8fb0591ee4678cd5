//! Kubernetes-backed cluster reader and eviction requester

use super::quantity::{count, cpu_millis, memory_bytes};
use super::{async_trait, ClusterReader, EvictionRequester};
use crate::error::{DeschedulerError, DeschedulerResult};
use crate::models::{Node, ResourceQuantities, Taint, Workload};
use k8s_openapi::api::core::v1::{Container, Node as K8sNode, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Annotation the kubelet puts on mirror pods of static manifests
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Cluster access through the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    node_selector: Option<String>,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            node_selector: None,
        }
    }

    /// Build a client from the in-cluster environment or the local kubeconfig
    pub async fn try_default() -> DeschedulerResult<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// Build a client from an explicit kubeconfig file
    pub async fn from_kubeconfig(path: &Path) -> DeschedulerResult<Self> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            DeschedulerError::Configuration(format!(
                "failed to read kubeconfig {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| DeschedulerError::Configuration(format!("invalid kubeconfig: {}", e)))?;

        Ok(Self::new(Client::try_from(config)?))
    }

    /// Only list nodes matching this label selector
    pub fn with_node_selector(mut self, selector: impl Into<String>) -> Self {
        self.node_selector = Some(selector.into());
        self
    }
}

#[async_trait]
impl ClusterReader for KubeCluster {
    async fn list_nodes(&self) -> DeschedulerResult<Vec<Node>> {
        let api: Api<K8sNode> = Api::all(self.client.clone());

        let mut params = ListParams::default();
        if let Some(selector) = &self.node_selector {
            params = params.labels(selector);
        }

        let list = api.list(&params).await.map_err(|e| DeschedulerError::Listing {
            target: "nodes".to_string(),
            message: e.to_string(),
        })?;

        let mut nodes = Vec::with_capacity(list.items.len());
        for item in &list.items {
            let name = item.metadata.name.clone().unwrap_or_default();
            if !is_node_ready(item) {
                debug!(node = %name, "Skipping node that is not ready");
                continue;
            }
            match node_from_k8s(item) {
                Ok(node) => nodes.push(node),
                Err(e) => warn!(node = %name, error = %e, "Skipping node with unreadable capacity"),
            }
        }

        Ok(nodes)
    }

    async fn list_workloads(&self, node: &Node) -> DeschedulerResult<Vec<Workload>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let selector = format!(
            "spec.nodeName={},status.phase!=Succeeded,status.phase!=Failed",
            node.name
        );

        let list = api
            .list(&ListParams::default().fields(&selector))
            .await
            .map_err(|e| DeschedulerError::Listing {
                target: format!("pods on node {}", node.name),
                message: e.to_string(),
            })?;

        list.items.iter().map(workload_from_k8s).collect()
    }
}

#[async_trait]
impl EvictionRequester for KubeCluster {
    async fn evict_workload(
        &self,
        workload: &Workload,
        policy_group_version: &str,
        dry_run: bool,
    ) -> DeschedulerResult<bool> {
        let eviction_error = |message: String| DeschedulerError::Eviction {
            pod: workload.key(),
            message,
        };

        let body = eviction_body(workload, policy_group_version, dry_run);
        let data = serde_json::to_vec(&body).map_err(|e| eviction_error(e.to_string()))?;

        let params = PostParams {
            dry_run,
            ..Default::default()
        };
        let request = kube::core::Request::new(format!("/api/v1/namespaces/{}/pods", workload.namespace))
            .create_subresource("eviction", &workload.name, &params, data)
            .map_err(|e| eviction_error(e.to_string()))?;

        match self.client.request::<serde_json::Value>(request).await {
            Ok(_) => Ok(true),
            // Disruption budget would be violated
            Err(kube::Error::Api(response)) if response.code == 429 => {
                debug!(pod = %workload.key(), reason = %response.message, "Eviction refused");
                Ok(false)
            }
            Err(e) => Err(eviction_error(e.to_string())),
        }
    }
}

/// Eviction object posted to the pod's `eviction` subresource
pub(crate) fn eviction_body(
    workload: &Workload,
    policy_group_version: &str,
    dry_run: bool,
) -> serde_json::Value {
    let mut delete_options = json!({});
    if dry_run {
        delete_options = json!({ "dryRun": ["All"] });
    }

    json!({
        "apiVersion": policy_group_version,
        "kind": "Eviction",
        "metadata": {
            "name": workload.name,
            "namespace": workload.namespace,
        },
        "deleteOptions": delete_options,
    })
}

fn is_node_ready(node: &K8sNode) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn quantity_of(
    list: &BTreeMap<String, Quantity>,
    key: &str,
    parse: fn(&str) -> DeschedulerResult<u64>,
) -> DeschedulerResult<u64> {
    match list.get(key) {
        Some(quantity) => parse(&quantity.0),
        None => Ok(0),
    }
}

/// Convert an API node; allocatable wins over raw capacity
pub fn node_from_k8s(node: &K8sNode) -> DeschedulerResult<Node> {
    let status = node.status.as_ref();
    let resources = status
        .and_then(|s| s.allocatable.as_ref())
        .filter(|allocatable| !allocatable.is_empty())
        .or_else(|| status.and_then(|s| s.capacity.as_ref()));

    let capacity = match resources {
        Some(list) => ResourceQuantities::new(
            quantity_of(list, "cpu", cpu_millis)?,
            quantity_of(list, "memory", memory_bytes)?,
            quantity_of(list, "pods", count)?,
        ),
        None => ResourceQuantities::default(),
    };

    let spec = node.spec.as_ref();
    let taints = spec
        .and_then(|s| s.taints.as_ref())
        .map(|taints| {
            taints
                .iter()
                .filter_map(|t| t.effect.parse().ok().map(|effect| Taint::new(t.key.clone(), effect)))
                .collect()
        })
        .unwrap_or_default();

    Ok(Node {
        name: node.metadata.name.clone().unwrap_or_default(),
        capacity,
        taints,
        unschedulable: spec.and_then(|s| s.unschedulable).unwrap_or(false),
        labels: node.metadata.labels.clone().unwrap_or_default(),
    })
}

/// Convert an API pod, summing container requests
pub fn workload_from_k8s(pod: &Pod) -> DeschedulerResult<Workload> {
    let metadata = &pod.metadata;
    let spec = pod.spec.as_ref();
    let owners = metadata.owner_references.as_deref().unwrap_or(&[]);

    let requests = match spec {
        Some(spec) => pod_requests(spec)?,
        None => ResourceQuantities::default(),
    };

    let uses_local_storage = spec
        .and_then(|s| s.volumes.as_ref())
        .map(|volumes| {
            volumes
                .iter()
                .any(|v| v.empty_dir.is_some() || v.host_path.is_some())
        })
        .unwrap_or(false);

    let is_mirror = metadata
        .annotations
        .as_ref()
        .map(|a| a.contains_key(MIRROR_POD_ANNOTATION))
        .unwrap_or(false);

    Ok(Workload {
        name: metadata.name.clone().unwrap_or_default(),
        namespace: metadata.namespace.clone().unwrap_or_else(|| "default".to_string()),
        node_name: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
        requests,
        has_owner: !owners.is_empty(),
        uses_local_storage,
        is_mirror,
        is_daemon_set: owners.iter().any(|o| o.kind == "DaemonSet"),
    })
}

fn pod_requests(spec: &PodSpec) -> DeschedulerResult<ResourceQuantities> {
    let mut total = ResourceQuantities::default();

    for container in &spec.containers {
        let requests = container_requests(container)?;
        total.cpu_millis = total.cpu_millis.saturating_add(requests.cpu_millis);
        total.memory_bytes = total.memory_bytes.saturating_add(requests.memory_bytes);
    }

    // Init containers run one at a time before the app containers
    for container in spec.init_containers.iter().flatten() {
        let requests = container_requests(container)?;
        total.cpu_millis = total.cpu_millis.max(requests.cpu_millis);
        total.memory_bytes = total.memory_bytes.max(requests.memory_bytes);
    }

    Ok(total)
}

fn container_requests(container: &Container) -> DeschedulerResult<ResourceQuantities> {
    match container.resources.as_ref().and_then(|r| r.requests.as_ref()) {
        Some(list) => Ok(ResourceQuantities::new(
            quantity_of(list, "cpu", cpu_millis)?,
            quantity_of(list, "memory", memory_bytes)?,
            0,
        )),
        None => Ok(ResourceQuantities::default()),
    }
}
