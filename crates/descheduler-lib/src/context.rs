//! Deadline and cancellation for a single strategy run

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Why a guarded call did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

impl std::fmt::Display for Interruption {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Interruption::DeadlineExceeded => write!(f, "deadline exceeded"),
            Interruption::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// Bounds every external call made during one strategy run
///
/// Once the deadline passes or a shutdown signal arrives, every later call
/// made through [`RunContext::guard`] fails immediately.
#[derive(Debug, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
    shutdown: Option<broadcast::Receiver<()>>,
    interrupted: Option<Interruption>,
}

impl RunContext {
    /// Unbounded context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The interruption that ended the run, if any
    pub fn interruption(&self) -> Option<Interruption> {
        self.interrupted
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Run `fut` unless the deadline or a shutdown signal comes first
    pub async fn guard<F: Future>(&mut self, fut: F) -> Result<F::Output, Interruption> {
        if let Some(interruption) = self.interrupted {
            return Err(interruption);
        }

        let deadline = self.deadline;
        let shutdown = self.shutdown.as_mut();

        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => Err(Interruption::Cancelled),
            _ = wait_for_deadline(deadline) => Err(Interruption::DeadlineExceeded),
            output = fut => Ok(output),
        };

        if let Err(interruption) = &result {
            self.interrupted = Some(*interruption);
        }
        result
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_shutdown(shutdown: Option<&mut broadcast::Receiver<()>>) {
    match shutdown {
        Some(rx) => match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            // Sender gone without signalling: never cancel
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}
