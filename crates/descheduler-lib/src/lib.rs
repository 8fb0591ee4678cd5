//! Bin-packing descheduler library
//!
//! This crate provides the core functionality for:
//! - Grouping pods by node and computing node utilization
//! - Selecting the least utilized node under configured thresholds
//! - Ordering and evicting that node's pods
//! - Kubernetes-backed cluster access
//! - Health checks and observability

pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use config::DeschedulerStrategy;
pub use context::{Interruption, RunContext};
pub use error::{DeschedulerError, DeschedulerResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DeschedulerMetrics, StructuredLogger};
pub use strategy::{BinPackingStrategy, EvictionReport};
