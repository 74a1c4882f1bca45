//! Assembles one edgemesh device from its configuration.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use edgemesh_placement::{Orchestrator, ServiceValidator};
use edgemesh_registry::{DeviceRegistry, OrchestrationInfo, PeerClient, PeerError};
use edgemesh_scoring::{ResourceSample, ScoringEngine, SystemSampler};
use edgemesh_state::StateStore;
use tracing::info;

use crate::config::Config;
use crate::executor::ProcessExecutor;

/// Peer client for a device without a wire transport.
///
/// Every remote call fails, so remote candidates score zero and only this
/// device can win when it is a candidate.
pub struct NoTransport;

impl NoTransport {
    fn unreachable(endpoint: &str) -> PeerError {
        PeerError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: "no peer transport configured".to_string(),
        }
    }
}

#[async_trait]
impl PeerClient for NoTransport {
    async fn get_score(&self, _self_id: &str, endpoint: &str) -> Result<f64, PeerError> {
        Err(Self::unreachable(endpoint))
    }

    async fn get_resource(
        &self,
        _self_id: &str,
        endpoint: &str,
    ) -> Result<ResourceSample, PeerError> {
        Err(Self::unreachable(endpoint))
    }

    async fn get_orchestration_info(
        &self,
        endpoint: &str,
    ) -> Result<OrchestrationInfo, PeerError> {
        Err(Self::unreachable(endpoint))
    }
}

/// Every subsystem of a running device.
pub struct Node {
    pub registry: Arc<DeviceRegistry>,
    pub engine: Arc<ScoringEngine>,
    pub orchestrator: Orchestrator,
}

impl Node {
    /// Open state, start the registry, and register configured services and
    /// seed peers.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let store = match config.db_path() {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("creating data dir {}", dir.display()))?;
                }
                let store = StateStore::open(&path)?;
                info!(path = ?path, "state store opened");
                store
            }
            None => {
                info!("no data dir configured, state is in-memory");
                StateStore::open_in_memory()?
            }
        };
        Self::with_store(config, store, Arc::new(NoTransport))
    }

    /// Like [`Node::open`] with a given store and peer client.
    pub fn with_store(
        config: &Config,
        store: StateStore,
        peers: Arc<dyn PeerClient>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let device_id = registry.start(config.local_device())?;

        let validator = ServiceValidator::new(store.clone(), registry.clone());
        for policy in config.policies() {
            validator
                .register(&policy)
                .with_context(|| format!("registering service {}", policy.service_name))?;
        }
        for record in config.peer_records() {
            let id = record.id.clone();
            registry
                .upsert(record)
                .with_context(|| format!("seeding peer {id}"))?;
        }

        let sampler = SystemSampler::new(registry.clone(), config.scoring.bandwidth_mbps);
        let engine = Arc::new(ScoringEngine::new(Arc::new(sampler), config.scoring.weights));
        let executor = ProcessExecutor::new(registry.self_record()?.endpoints);

        let orchestrator = Orchestrator::new(
            registry.clone(),
            engine.clone(),
            peers,
            Arc::new(executor),
            validator,
            config.orchestrator_config(),
        );
        orchestrator.start()?;

        info!(
            %device_id,
            services = config.services.len(),
            peers = config.peers.len(),
            "device ready"
        );
        Ok(Self {
            registry,
            engine,
            orchestrator,
        })
    }
}
