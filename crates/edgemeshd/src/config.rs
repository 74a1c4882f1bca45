//! edgemesh.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use edgemesh_placement::{DEFAULT_DEADLINE, OrchestratorConfig};
use edgemesh_registry::LocalDevice;
use edgemesh_scoring::{REFERENCE_BANDWIDTH_MBPS, ScoringWeights};
use edgemesh_state::{DeviceRecord, ExecutionType, ServicePolicy};
use serde::{Deserialize, Serialize};

/// File name of the redb database inside `data_dir`.
pub const DB_FILE: &str = "edgemesh.redb";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub placement: PlacementConfig,
    pub scoring: ScoringConfig,
    #[serde(rename = "service")]
    pub services: Vec<ServiceConfig>,
    #[serde(rename = "peer")]
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub platform: String,
    pub execution_type: ExecutionType,
    pub endpoints: Vec<String>,
    /// Without a data directory the state lives in memory only.
    pub data_dir: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            execution_type: ExecutionType::Native,
            endpoints: Vec::new(),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub deadline_ms: u64,
    pub self_selection: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE.as_millis() as u64,
            self_selection: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Link speed of this device. Must be positive.
    pub bandwidth_mbps: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            bandwidth_mbps: REFERENCE_BANDWIDTH_MBPS,
        }
    }
}

/// A service this device runs locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub executable: String,
    #[serde(default)]
    pub allowed_requesters: Vec<String>,
}

/// A device known up front, before discovery reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: String,
    #[serde(default = "default_peer_platform")]
    pub platform: String,
    pub execution_type: ExecutionType,
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub rtt_ms: Option<f64>,
}

fn default_peer_platform() -> String {
    "unknown".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.device.data_dir.as_ref().map(|dir| dir.join(DB_FILE))
    }

    pub fn local_device(&self) -> LocalDevice {
        LocalDevice {
            platform: self.device.platform.clone(),
            execution_type: self.device.execution_type,
            endpoints: self.device.endpoints.clone(),
            services: Vec::new(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            deadline: Duration::from_millis(self.placement.deadline_ms),
            self_selection: self.placement.self_selection,
        }
    }

    pub fn policies(&self) -> impl Iterator<Item = ServicePolicy> + '_ {
        self.services.iter().map(|s| ServicePolicy {
            service_name: s.name.clone(),
            executable: s.executable.clone(),
            allowed_requesters: s.allowed_requesters.clone(),
        })
    }

    pub fn peer_records(&self) -> impl Iterator<Item = DeviceRecord> + '_ {
        self.peers.iter().map(|p| {
            let record = DeviceRecord::new(&p.id, p.execution_type, &p.platform)
                .with_endpoints(p.endpoints.iter().cloned())
                .with_services(p.services.iter().cloned());
            match p.rtt_ms {
                Some(rtt) => record.with_rtt(rtt),
                None => record,
            }
        })
    }
}
