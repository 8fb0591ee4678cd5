//! Core data models for the descheduler
//!
//! Every value here is a point-in-time snapshot built at the start of a
//! strategy run and dropped at the end of it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Resource dimensions the strategy knows how to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceName {
    /// CPU, in millicores
    Cpu,
    /// Memory, in bytes
    Memory,
    /// Number of pods (workload slots)
    Pods,
}

impl ResourceName {
    pub const ALL: [ResourceName; 3] = [ResourceName::Cpu, ResourceName::Memory, ResourceName::Pods];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceName::Cpu => "cpu",
            ResourceName::Memory => "memory",
            ResourceName::Pods => "pods",
        }
    }
}

impl Display for ResourceName {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ResourceName::Cpu),
            "memory" => Ok(ResourceName::Memory),
            "pods" => Ok(ResourceName::Pods),
            other => Err(format!("unknown resource name: {}", other)),
        }
    }
}

impl TryFrom<String> for ResourceName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceName> for String {
    fn from(resource: ResourceName) -> Self {
        resource.as_str().to_string()
    }
}

/// Per-resource quantities in fixed units (millicores, bytes, pod count)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    pub pods: u64,
}

impl ResourceQuantities {
    pub fn new(cpu_millis: u64, memory_bytes: u64, pods: u64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
            pods,
        }
    }

    pub fn get(&self, resource: ResourceName) -> u64 {
        match resource {
            ResourceName::Cpu => self.cpu_millis,
            ResourceName::Memory => self.memory_bytes,
            ResourceName::Pods => self.pods,
        }
    }
}

/// Effect of a node taint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

impl FromStr for TaintEffect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoSchedule" => Ok(TaintEffect::NoSchedule),
            "PreferNoSchedule" => Ok(TaintEffect::PreferNoSchedule),
            "NoExecute" => Ok(TaintEffect::NoExecute),
            other => Err(format!("unknown taint effect: {}", other)),
        }
    }
}

/// Node taint marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub effect: TaintEffect,
}

impl Taint {
    pub fn new(key: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            effect,
        }
    }
}

/// Compute host snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Allocatable capacity; `pods` is the maximum pod count
    pub capacity: ResourceQuantities,
    pub taints: Vec<Taint>,
    pub unschedulable: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Node {
    pub fn new(name: impl Into<String>, capacity: ResourceQuantities) -> Self {
        Self {
            name: name.into(),
            capacity,
            taints: Vec::new(),
            unschedulable: false,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_taint(mut self, taint: Taint) -> Self {
        self.taints.push(taint);
        self
    }

    pub fn with_unschedulable(mut self, unschedulable: bool) -> Self {
        self.unschedulable = unschedulable;
        self
    }

    pub fn has_taint(&self, key: &str, effect: TaintEffect) -> bool {
        self.taints.iter().any(|t| t.key == key && t.effect == effect)
    }
}

/// Relocatable workload unit (pod) bound to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub node_name: String,
    /// Requested CPU and memory; `pods` is unused
    pub requests: ResourceQuantities,
    /// Managed by a higher-level controller
    pub has_owner: bool,
    pub uses_local_storage: bool,
    /// Static pod mirrored from the kubelet
    #[serde(default)]
    pub is_mirror: bool,
    #[serde(default)]
    pub is_daemon_set: bool,
}

impl Workload {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        node_name: impl Into<String>,
        cpu_millis: u64,
        memory_bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            node_name: node_name.into(),
            requests: ResourceQuantities::new(cpu_millis, memory_bytes, 0),
            has_owner: true,
            uses_local_storage: false,
            is_mirror: false,
            is_daemon_set: false,
        }
    }

    /// `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Utilization percentage per resource dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUtilization {
    pub node_name: String,
    pub percentages: BTreeMap<ResourceName, f64>,
}

impl NodeUtilization {
    pub fn get(&self, resource: ResourceName) -> f64 {
        self.percentages.get(&resource).copied().unwrap_or(0.0)
    }
}

/// Resource name to percentage in [0, 100]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceThresholds(BTreeMap<ResourceName, f64>);

impl ResourceThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: ResourceName, percent: f64) -> Self {
        self.0.insert(resource, percent);
        self
    }

    pub fn insert(&mut self, resource: ResourceName, percent: f64) {
        self.0.insert(resource, percent);
    }

    pub fn get(&self, resource: ResourceName) -> Option<f64> {
        self.0.get(&resource).copied()
    }

    pub fn contains(&self, resource: ResourceName) -> bool {
        self.0.contains_key(&resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceName, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ResourceName, f64)> for ResourceThresholds {
    fn from_iter<I: IntoIterator<Item = (ResourceName, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
