//! Executor for services placed on this device.
//!
//! Launches the command as a child process and reports its lifecycle on the
//! request's notify channel. Placements on other devices need the wire
//! transport, which this binary does not carry.

use std::process::Stdio;

use async_trait::async_trait;
use edgemesh_placement::{ExecutionError, ExecutionRequest, ExecutionStatus, Executor};
use tokio::process::Command;
use tracing::{info, warn};

pub struct ProcessExecutor {
    self_endpoints: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(self_endpoints: Vec<String>) -> Self {
        Self { self_endpoints }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<(), ExecutionError> {
        let fail = |reason: String| ExecutionError {
            endpoint: request.endpoint.clone(),
            service_name: request.service_name.clone(),
            reason,
        };

        if !self.self_endpoints.contains(&request.endpoint) {
            return Err(fail("remote execution needs a peer transport".to_string()));
        }
        let Some((program, args)) = request.args.split_first() else {
            return Err(fail("empty command".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| fail(e.to_string()))?;

        info!(
            service = %request.service_name,
            requester = %request.requester,
            pid = child.id(),
            "service launched"
        );
        let _ = request.notify.try_send(ExecutionStatus::Started);

        let notify = request.notify;
        let service = request.service_name;
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => ExecutionStatus::Completed {
                    exit_code: status.code().unwrap_or(-1),
                },
                Err(e) => {
                    warn!(%service, error = %e, "waiting for service failed");
                    ExecutionStatus::Failed(e.to_string())
                }
            };
            info!(%service, ?status, "service finished");
            let _ = notify.send(status).await;
        });
        Ok(())
    }
}
