//! Domain types for the edgemesh state store.
//!
//! A [`DeviceRecord`] is the logical view of a fleet device. On disk it is
//! split into three partitions ([`DeviceConfig`], [`DeviceNetwork`],
//! [`DeviceServices`]) that share the device id as key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Unique identifier for a device in the fleet.
pub type DeviceId = String;

// ── Execution type ─────────────────────────────────────────────────

/// How a device runs workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    Native,
    Android,
    Container,
}

impl ExecutionType {
    pub const ALL: [ExecutionType; 3] = [Self::Native, Self::Android, Self::Container];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Android => "android",
            Self::Container => "container",
        }
    }

    /// Whether any device of this type can run any workload of this type,
    /// independent of the service names it advertises.
    pub fn is_fungible(&self) -> bool {
        matches!(self, Self::Container)
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionType {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "android" => Ok(Self::Android),
            "container" => Ok(Self::Container),
            other => Err(StateError::InvalidValue(format!(
                "unknown execution type: {other}"
            ))),
        }
    }
}

// ── Device partitions ──────────────────────────────────────────────

/// Configuration partition: what kind of device this is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub platform: String,
    pub execution_type: ExecutionType,
    /// Unix timestamp (seconds) of the last write.
    pub updated_at: u64,
}

/// Network partition: where the device can be reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceNetwork {
    pub id: DeviceId,
    pub endpoints: Vec<String>,
    /// Last measured round-trip time in milliseconds.
    pub rtt_ms: Option<f64>,
    pub updated_at: u64,
}

/// Service-list partition: what the device advertises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceServices {
    pub id: DeviceId,
    pub services: Vec<String>,
    pub updated_at: u64,
}

/// The logical device record assembled from all three partitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub execution_type: ExecutionType,
    pub platform: String,
    /// Ordered and deduplicated.
    pub endpoints: Vec<String>,
    /// Deduplicated, in advertisement order.
    pub services: Vec<String>,
    pub rtt_ms: Option<f64>,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>, execution_type: ExecutionType, platform: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            execution_type,
            platform: platform.into(),
            endpoints: Vec::new(),
            services: Vec::new(),
            rtt_ms: None,
        }
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = dedup(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = dedup(services.into_iter().map(Into::into));
        self
    }

    pub fn with_rtt(mut self, rtt_ms: f64) -> Self {
        self.rtt_ms = Some(rtt_ms);
        self
    }

    /// Append endpoints not already present, keeping existing order.
    pub fn merge_endpoints<'a>(&mut self, incoming: impl IntoIterator<Item = &'a String>) {
        for endpoint in incoming {
            if !self.endpoints.contains(endpoint) {
                self.endpoints.push(endpoint.clone());
            }
        }
    }

    pub fn advertises(&self, service_name: &str) -> bool {
        self.services.iter().any(|s| s == service_name)
    }

    /// Split into the three stored partitions.
    pub fn to_partitions(&self, now: u64) -> (DeviceConfig, DeviceNetwork, DeviceServices) {
        (
            DeviceConfig {
                id: self.id.clone(),
                platform: self.platform.clone(),
                execution_type: self.execution_type,
                updated_at: now,
            },
            DeviceNetwork {
                id: self.id.clone(),
                endpoints: self.endpoints.clone(),
                rtt_ms: self.rtt_ms,
                updated_at: now,
            },
            DeviceServices {
                id: self.id.clone(),
                services: self.services.clone(),
                updated_at: now,
            },
        )
    }

    /// Reassemble a record from its partitions.
    pub fn from_partitions(
        config: DeviceConfig,
        network: DeviceNetwork,
        services: DeviceServices,
    ) -> Self {
        Self {
            id: config.id,
            execution_type: config.execution_type,
            platform: config.platform,
            endpoints: network.endpoints,
            services: services.services,
            rtt_ms: network.rtt_ms,
        }
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// ── Service policy ─────────────────────────────────────────────────

/// A service this device is willing to execute locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePolicy {
    pub service_name: String,
    /// The only executable a request for this service may launch.
    pub executable: String,
    /// Requester identities allowed to run this service here.
    pub allowed_requesters: Vec<String>,
}

impl ServicePolicy {
    pub fn allows(&self, requester: &str) -> bool {
        self.allowed_requesters.iter().any(|r| r == requester)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_type_round_trips_through_str() {
        for ty in ExecutionType::ALL {
            assert_eq!(ty.as_str().parse::<ExecutionType>().unwrap(), ty);
        }
        assert!("vm".parse::<ExecutionType>().is_err());
    }

    #[test]
    fn only_container_is_fungible() {
        assert!(ExecutionType::Container.is_fungible());
        assert!(!ExecutionType::Native.is_fungible());
        assert!(!ExecutionType::Android.is_fungible());
    }

    #[test]
    fn builder_dedups_endpoints_and_services() {
        let record = DeviceRecord::new("d1", ExecutionType::Native, "linux")
            .with_endpoints(["10.0.0.1", "10.0.0.1", "10.0.0.2"])
            .with_services(["ls", "ls"]);

        assert_eq!(record.endpoints, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(record.services, vec!["ls"]);
    }

    #[test]
    fn merge_endpoints_is_union_preserving_order() {
        let mut record = DeviceRecord::new("d1", ExecutionType::Native, "linux")
            .with_endpoints(["10.0.0.1", "10.0.0.2"]);
        let incoming = vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()];

        record.merge_endpoints(&incoming);

        assert_eq!(record.endpoints, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn partitions_reassemble_to_same_record() {
        let record = DeviceRecord::new("d1", ExecutionType::Android, "android-13")
            .with_endpoints(["192.168.1.4"])
            .with_services(["camera"])
            .with_rtt(4.5);

        let (config, network, services) = record.to_partitions(1000);
        assert_eq!(config.updated_at, 1000);
        assert_eq!(DeviceRecord::from_partitions(config, network, services), record);
    }

    #[test]
    fn policy_allow_list() {
        let policy = ServicePolicy {
            service_name: "ls".to_string(),
            executable: "/bin/ls".to_string(),
            allowed_requesters: vec!["shell".to_string()],
        };
        assert!(policy.allows("shell"));
        assert!(!policy.allows("browser"));
    }
}
