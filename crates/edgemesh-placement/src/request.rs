//! Placement request and result types.

use std::fmt;

use edgemesh_state::ExecutionType;
use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, PlacementErrorResult};

/// How candidates are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Peers score themselves and return a number.
    #[default]
    Score,
    /// Peers return raw resource samples, scored by the requester.
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecOptions {
    pub scoring: ScoringMode,
}

/// The command to run if the service lands on a device of `execution_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestServiceInfo {
    pub execution_type: ExecutionType,
    pub exec_command: String,
    #[serde(default)]
    pub exec_options: ExecOptions,
}

impl RequestServiceInfo {
    /// Whitespace-split command line.
    pub fn argv(&self) -> Vec<String> {
        self.exec_command
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service_name: String,
    /// Whether this device may be chosen. `None` uses the orchestrator default.
    #[serde(default)]
    pub self_selection: Option<bool>,
    pub service_requester: String,
    pub service_info: Vec<RequestServiceInfo>,
}

impl ServiceRequest {
    pub fn validate(&self) -> PlacementErrorResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(PlacementError::InvalidParameter("empty service name".into()));
        }
        if self.service_requester.trim().is_empty() {
            return Err(PlacementError::InvalidParameter("empty service requester".into()));
        }
        if self.service_info.is_empty() {
            return Err(PlacementError::InvalidParameter("no service info".into()));
        }
        if let Some(info) = self.service_info.iter().find(|i| i.exec_command.trim().is_empty()) {
            return Err(PlacementError::InvalidParameter(format!(
                "empty command for execution type {}",
                info.execution_type
            )));
        }
        Ok(())
    }

    /// Execution types the requester accepts, first mention first.
    pub fn accepted_types(&self) -> Vec<ExecutionType> {
        let mut types = Vec::with_capacity(self.service_info.len());
        for info in &self.service_info {
            if !types.contains(&info.execution_type) {
                types.push(info.execution_type);
            }
        }
        types
    }

    /// The first entry's options decide the mode for the whole request.
    pub fn scoring_mode(&self) -> ScoringMode {
        self.service_info
            .first()
            .map(|info| info.exec_options.scoring)
            .unwrap_or_default()
    }

    pub fn info_for(&self, execution_type: ExecutionType) -> Option<&RequestServiceInfo> {
        self.service_info
            .iter()
            .find(|info| info.execution_type == execution_type)
    }
}

/// Fixed vocabulary of placement outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultMessage {
    ErrorNone,
    InvalidParameter,
    ServiceNotFound,
    InternalServerError,
    NotAllowedCommand,
    NotAllowedRequester,
}

impl ResultMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorNone => "ERROR_NONE",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::NotAllowedCommand => "NOT_ALLOWED_COMMAND",
            Self::NotAllowedRequester => "NOT_ALLOWED_REQUESTER",
        }
    }
}

impl fmt::Display for ResultMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the requester gets back. Always produced, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub message: ResultMessage,
    pub service_name: String,
    pub execution_type: Option<ExecutionType>,
    /// Endpoint the service was dispatched to; empty on failure.
    pub target: String,
}

impl PlacementResult {
    pub fn failed(message: ResultMessage, service_name: impl Into<String>) -> Self {
        Self {
            message,
            service_name: service_name.into(),
            execution_type: None,
            target: String::new(),
        }
    }
}
