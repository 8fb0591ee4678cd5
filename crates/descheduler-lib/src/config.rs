//! Strategy configuration records

use crate::error::{DeschedulerError, DeschedulerResult};
use crate::models::{ResourceName, ResourceThresholds};
use serde::{Deserialize, Serialize};

/// Eviction API group version used when none is configured
pub const DEFAULT_POLICY_GROUP_VERSION: &str = "policy/v1";

/// Dimensions that must always carry a threshold
pub const REQUIRED_THRESHOLDS: [ResourceName; 2] = [ResourceName::Cpu, ResourceName::Pods];

/// Configuration of the bin-packing strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeschedulerStrategy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Ceiling under which a node counts as under-utilized
    #[serde(default)]
    pub thresholds: ResourceThresholds,

    #[serde(default)]
    pub evict_local_storage_pods: bool,

    /// Simulate evictions without touching the cluster
    #[serde(default)]
    pub dry_run: bool,

    /// Passed verbatim to the eviction requester
    #[serde(default = "default_policy_group_version")]
    pub policy_group_version: String,

    /// Upper bound on evictions from the selected node per run
    #[serde(default)]
    pub max_pods_to_evict_per_node: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

fn default_policy_group_version() -> String {
    DEFAULT_POLICY_GROUP_VERSION.to_string()
}

impl Default for DeschedulerStrategy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            thresholds: ResourceThresholds::new(),
            evict_local_storage_pods: false,
            dry_run: false,
            policy_group_version: default_policy_group_version(),
            max_pods_to_evict_per_node: None,
        }
    }
}

impl DeschedulerStrategy {
    pub fn new(thresholds: ResourceThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_evict_local_storage_pods(mut self, evict: bool) -> Self {
        self.evict_local_storage_pods = evict;
        self
    }

    pub fn with_max_pods_to_evict_per_node(mut self, max: usize) -> Self {
        self.max_pods_to_evict_per_node = Some(max);
        self
    }

    /// Check the configuration before any cluster interaction
    pub fn validate(&self) -> DeschedulerResult<()> {
        for resource in REQUIRED_THRESHOLDS {
            if !self.thresholds.contains(resource) {
                return Err(DeschedulerError::Configuration(format!(
                    "missing threshold for resource {}",
                    resource
                )));
            }
        }

        for (resource, percent) in self.thresholds.iter() {
            if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                return Err(DeschedulerError::Configuration(format!(
                    "threshold for {} must be within [0, 100], got {}",
                    resource, percent
                )));
            }
        }

        if self.policy_group_version.trim().is_empty() {
            return Err(DeschedulerError::Configuration(
                "policy group version must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn valid_thresholds() -> ResourceThresholds {
        ResourceThresholds::new()
            .with(ResourceName::Cpu, 70.0)
            .with(ResourceName::Pods, 20.0)
    }

    #[test]
    fn test_valid_configuration() {
        let strategy = DeschedulerStrategy::new(valid_thresholds());
        assert_ok!(strategy.validate());
        assert_eq!(strategy.policy_group_version, "policy/v1");
    }

    #[test]
    fn test_missing_pods_threshold_is_rejected() {
        let strategy =
            DeschedulerStrategy::new(ResourceThresholds::new().with(ResourceName::Cpu, 70.0));

        let err = strategy.validate().unwrap_err();
        assert!(matches!(err, DeschedulerError::Configuration(_)));
        assert!(err.to_string().contains("pods"));
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let strategy =
            DeschedulerStrategy::new(valid_thresholds().with(ResourceName::Memory, 120.0));
        assert_err!(strategy.validate());

        let strategy = DeschedulerStrategy::new(valid_thresholds().with(ResourceName::Cpu, -1.0));
        assert_err!(strategy.validate());

        let strategy =
            DeschedulerStrategy::new(valid_thresholds().with(ResourceName::Cpu, f64::NAN));
        assert_err!(strategy.validate());
    }

    #[test]
    fn test_empty_policy_group_version_is_rejected() {
        let mut strategy = DeschedulerStrategy::new(valid_thresholds());
        strategy.policy_group_version = "  ".to_string();
        assert_err!(strategy.validate());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let strategy: DeschedulerStrategy =
            serde_json::from_str(r#"{"thresholds": {"cpu": 50, "pods": 30}}"#).unwrap();

        assert!(strategy.enabled);
        assert!(!strategy.dry_run);
        assert!(!strategy.evict_local_storage_pods);
        assert_eq!(strategy.max_pods_to_evict_per_node, None);
        assert_eq!(strategy.thresholds.get(ResourceName::Cpu), Some(50.0));
    }
}
