//! Descheduler error types

use thiserror::Error;

/// Errors that can occur while running a descheduling strategy
#[derive(Debug, Error)]
pub enum DeschedulerError {
    /// Invalid strategy configuration; fatal to the run
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to list {target}: {message}")]
    Listing { target: String, message: String },

    #[error("failed to evict pod {pod}: {message}")]
    Eviction { pod: String, message: String },

    #[error("invalid resource quantity: {0}")]
    Quantity(String),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}

pub type DeschedulerResult<T> = Result<T, DeschedulerError>;
