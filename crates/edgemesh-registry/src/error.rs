//! Registry error types.

use thiserror::Error;

use crate::peer::PeerError;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by the device registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No self id has been assigned yet.
    #[error("registry not started")]
    NotStarted,

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("refusing to remove this device: {0}")]
    SelfRemoval(String),

    /// This device's record changes only through its own advertisement.
    #[error("refusing to overwrite this device's record: {0}")]
    SelfOverwrite(String),

    #[error("service already advertised: {0}")]
    DuplicateService(String),

    #[error("service not advertised: {0}")]
    ServiceNotAdvertised(String),

    #[error("service name is reserved: {0}")]
    ReservedName(String),

    #[error("invalid service name: {0:?}")]
    InvalidServiceName(String),

    #[error("advertisement payload of {size} bytes exceeds {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("state store error: {0}")]
    State(#[from] edgemesh_state::StateError),
}
