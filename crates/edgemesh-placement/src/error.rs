//! Placement error types.

use edgemesh_registry::{PeerError, RegistryError};
use thiserror::Error;

use crate::executor::ExecutionError;
use crate::request::ResultMessage;
use crate::validator::ValidationError;

pub type PlacementErrorResult<T> = Result<T, PlacementError>;

/// Why a placement request did not dispatch.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("placement engine not started")]
    NotStarted,

    #[error("no device can run service {0}")]
    NotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Absorbed into a zero score; never the outcome of a request.
    #[error("peer unreachable: {0}")]
    RemoteUnreachable(#[from] PeerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PlacementError {
    /// The result vocabulary entry reported to the requester.
    pub fn message(&self) -> ResultMessage {
        match self {
            Self::NotFound(_) => ResultMessage::ServiceNotFound,
            Self::InvalidParameter(_) => ResultMessage::InvalidParameter,
            Self::ValidationFailed(e) => e.message(),
            Self::NotStarted | Self::RemoteUnreachable(_) | Self::Internal(_) => {
                ResultMessage::InternalServerError
            }
        }
    }
}

impl From<RegistryError> for PlacementError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotStarted => Self::NotStarted,
            RegistryError::NotFound(id) => Self::NotFound(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ExecutionError> for PlacementError {
    fn from(e: ExecutionError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_keep_their_meaning() {
        assert_eq!(
            PlacementError::from(RegistryError::NotStarted).message(),
            ResultMessage::InternalServerError
        );
        assert!(matches!(
            PlacementError::from(RegistryError::NotStarted),
            PlacementError::NotStarted
        ));
        assert_eq!(
            PlacementError::from(RegistryError::NotFound("d1".into())).message(),
            ResultMessage::ServiceNotFound
        );
        assert_eq!(
            PlacementError::from(RegistryError::DuplicateService("x".into())).message(),
            ResultMessage::InternalServerError
        );
    }

    #[test]
    fn validation_errors_report_validator_message() {
        let e = PlacementError::from(ValidationError::NotAllowedRequester("svc".into()));
        assert_eq!(e.message(), ResultMessage::NotAllowedRequester);
    }
}
