//! Health tracking for the descheduler process
//!
//! Backs the liveness and readiness probes served by the binary. The
//! control loop marks the cluster reader and evictor healthy, degraded or
//! unhealthy after every run.

use crate::strategy::EvictionReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Some calls failed but runs still complete
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const CLUSTER_READER: &str = "cluster_reader";
    pub const EVICTOR: &str = "evictor";
}

/// Shared registry of component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Fold the outcome of a strategy run into component health
    ///
    /// Listing failures degrade the cluster reader and eviction failures
    /// degrade the evictor; a clean run restores both.
    pub async fn record_run(&self, report: &EvictionReport) {
        if report.listing_failures.is_empty() {
            self.set_healthy(components::CLUSTER_READER).await;
        } else {
            self.set_degraded(
                components::CLUSTER_READER,
                format!("{} listing(s) failed", report.listing_failures.len()),
            )
            .await;
        }

        if report.failures.is_empty() {
            self.set_healthy(components::EVICTOR).await;
        } else {
            self.set_degraded(
                components::EVICTOR,
                format!("{} eviction(s) failed", report.failures.len()),
            )
            .await;
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Descheduler not yet initialized".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{EvictionFailure, ListingFailure};

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_health_registry_degraded_status() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_READER).await;
        registry.register(components::EVICTOR).await;

        registry.set_degraded(components::EVICTOR, "eviction refused").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_health_registry_unhealthy_status() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_READER).await;
        registry.register(components::EVICTOR).await;

        registry
            .set_unhealthy(components::CLUSTER_READER, "node listing failed")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Descheduler not yet initialized"));
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_READER).await;
        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::CLUSTER_READER, "Failed").await;
        assert!(!registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_record_run_degrades_and_recovers() {
        let registry = HealthRegistry::new();
        let report = EvictionReport {
            listing_failures: vec![ListingFailure {
                target: "n1".to_string(),
                cause: "timeout".to_string(),
            }],
            failures: vec![EvictionFailure {
                pod: "p".to_string(),
                namespace: "default".to_string(),
                cause: "eviction refused".to_string(),
            }],
            ..Default::default()
        };

        registry.record_run(&report).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::CLUSTER_READER].message.as_deref(),
            Some("1 listing(s) failed")
        );

        registry.record_run(&EvictionReport::default()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }
}
