//! Local execution guard.
//!
//! Before a request runs on this device, the command must launch exactly
//! the executable registered for the service and the requester must be on
//! the service's allow-list. Policies live in the `service_policies` bucket.

use std::sync::Arc;

use edgemesh_registry::{DeviceRegistry, RegistryError};
use edgemesh_state::{ServicePolicy, StateError, StateStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::request::ResultMessage;

/// Characters that let one argument smuggle in a second command.
pub const SHELL_METACHARACTERS: [char; 8] = [';', '|', '&', '$', '`', '>', '<', '\n'];

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("command not allowed for service {0}")]
    NotAllowedCommand(String),

    #[error("requester not allowed for service {0}")]
    NotAllowedRequester(String),

    #[error("invalid service policy: {0}")]
    InvalidPolicy(String),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl ValidationError {
    pub fn message(&self) -> ResultMessage {
        match self {
            Self::NotAllowedCommand(_) => ResultMessage::NotAllowedCommand,
            Self::NotAllowedRequester(_) => ResultMessage::NotAllowedRequester,
            Self::InvalidPolicy(_) => ResultMessage::InvalidParameter,
            Self::Registry(_) | Self::State(_) => ResultMessage::InternalServerError,
        }
    }
}

/// Service policies of this device and the checks built on them.
#[derive(Clone)]
pub struct ServiceValidator {
    store: StateStore,
    registry: Arc<DeviceRegistry>,
}

impl ServiceValidator {
    pub fn new(store: StateStore, registry: Arc<DeviceRegistry>) -> Self {
        Self { store, registry }
    }

    /// Persist a policy and advertise the service from this device.
    pub fn register(&self, policy: &ServicePolicy) -> ValidationResult<()> {
        if policy.service_name.trim().is_empty() || policy.executable.trim().is_empty() {
            return Err(ValidationError::InvalidPolicy(format!(
                "service {:?} needs a name and an executable",
                policy.service_name
            )));
        }
        if policy.executable.contains(SHELL_METACHARACTERS) {
            return Err(ValidationError::InvalidPolicy(format!(
                "executable of {} contains shell metacharacters",
                policy.service_name
            )));
        }

        match self.registry.add_service_name(&policy.service_name) {
            Ok(_) | Err(RegistryError::DuplicateService(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.store.put_policy(policy)?;
        info!(
            service = %policy.service_name,
            executable = %policy.executable,
            requesters = policy.allowed_requesters.len(),
            "service registered"
        );
        Ok(())
    }

    /// Drop a policy and stop advertising the service. Returns whether a
    /// policy existed.
    pub fn unregister(&self, service_name: &str) -> ValidationResult<bool> {
        let existed = self.store.delete_policy(service_name)?;
        match self.registry.remove_service_name(service_name) {
            Ok(_) | Err(RegistryError::ServiceNotAdvertised(_)) => {}
            Err(e) => return Err(e.into()),
        }
        if existed {
            info!(service = %service_name, "service unregistered");
        }
        Ok(existed)
    }

    pub fn get(&self, service_name: &str) -> ValidationResult<Option<ServicePolicy>> {
        Ok(self.store.get_policy(service_name)?)
    }

    pub fn list(&self) -> ValidationResult<Vec<ServicePolicy>> {
        Ok(self.store.list_policies()?)
    }

    /// `argv[0]` must equal the registered executable, and no argument may
    /// carry shell control characters.
    pub fn check_command(&self, service_name: &str, argv: &[String]) -> ValidationResult<()> {
        let denied = || ValidationError::NotAllowedCommand(service_name.to_string());

        let Some(program) = argv.first() else {
            warn!(service = %service_name, "empty command rejected");
            return Err(denied());
        };
        if argv.iter().any(|arg| arg.contains(SHELL_METACHARACTERS)) {
            warn!(service = %service_name, "command with shell metacharacters rejected");
            return Err(denied());
        }
        match self.store.get_policy(service_name)? {
            Some(policy) if policy.executable == *program => Ok(()),
            Some(policy) => {
                warn!(
                    service = %service_name,
                    requested = %program,
                    registered = %policy.executable,
                    "command does not match registered executable"
                );
                Err(denied())
            }
            None => {
                warn!(service = %service_name, "no executable registered for service");
                Err(denied())
            }
        }
    }

    pub fn check_requester(&self, service_name: &str, requester: &str) -> ValidationResult<()> {
        match self.store.get_policy(service_name)? {
            Some(policy) if policy.allows(requester) => Ok(()),
            _ => {
                warn!(service = %service_name, %requester, "requester not allowed");
                Err(ValidationError::NotAllowedRequester(service_name.to_string()))
            }
        }
    }

    /// Command first, then requester.
    pub fn validate(
        &self,
        service_name: &str,
        argv: &[String],
        requester: &str,
    ) -> ValidationResult<()> {
        self.check_command(service_name, argv)?;
        self.check_requester(service_name, requester)
    }
}
