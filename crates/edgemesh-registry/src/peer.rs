//! Remote peer RPC seam.
//!
//! The wire transport lives outside this workspace; it implements
//! [`PeerClient`] and hands it to the registry and the orchestrator.

use async_trait::async_trait;
use edgemesh_scoring::ResourceSample;
use edgemesh_state::ExecutionType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a peer reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationInfo {
    pub platform: String,
    pub execution_type: ExecutionType,
    pub services: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("malformed response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },
}

/// Calls made from this device to another device of the fleet.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Ask the peer to score itself for a request from `self_id`.
    async fn get_score(&self, self_id: &str, endpoint: &str) -> Result<f64, PeerError>;

    /// Ask the peer for raw resource numbers, scored locally.
    async fn get_resource(&self, self_id: &str, endpoint: &str)
    -> Result<ResourceSample, PeerError>;

    /// Ask the peer what it is and what it advertises.
    async fn get_orchestration_info(&self, endpoint: &str)
    -> Result<OrchestrationInfo, PeerError>;
}
