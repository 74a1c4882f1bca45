//! Seam to the process executors (native, android, container).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Progress reported by an executor through [`ExecutionRequest::notify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Started,
    Completed { exit_code: i32 },
    Failed(String),
}

/// Everything an executor needs to launch a placed service.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub endpoint: String,
    pub service_name: String,
    pub requester: String,
    pub args: Vec<String>,
    pub notify: mpsc::Sender<ExecutionStatus>,
}

#[derive(Debug, Error)]
#[error("execution of {service_name} on {endpoint} failed: {reason}")]
pub struct ExecutionError {
    pub endpoint: String,
    pub service_name: String,
    pub reason: String,
}

/// Launches a service on the chosen device.
///
/// `execute` returns once the launch has been handed off; completion is
/// reported through the request's `notify` channel.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<(), ExecutionError>;
}
