//! Discovery event types and the re-announcement seam.

use edgemesh_state::{DeviceRecord, ExecutionType};
use serde::{Deserialize, Serialize};

/// A device advertisement as reported by the discovery transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAdvertisement {
    pub id: String,
    /// Remaining lifetime in seconds; `0` means the device went away.
    pub ttl: u32,
    pub platform: String,
    pub execution_type: ExecutionType,
    pub endpoints: Vec<String>,
    pub services: Vec<String>,
    #[serde(default)]
    pub rtt_ms: Option<f64>,
}

impl DeviceAdvertisement {
    pub fn is_expiry(&self) -> bool {
        self.ttl == 0
    }

    pub fn to_record(&self) -> DeviceRecord {
        let record = DeviceRecord::new(&self.id, self.execution_type, &self.platform)
            .with_endpoints(self.endpoints.iter().cloned())
            .with_services(self.services.iter().cloned());
        match self.rtt_ms {
            Some(rtt) => record.with_rtt(rtt),
            None => record,
        }
    }
}

/// What the registry did with a discovery event.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Updated(String),
    Removed { id: String, existed: bool },
    /// All non-self devices were dropped.
    Resynced(Vec<String>),
    Ignored(String),
}

/// Fleet-wide relay that re-publishes this device's advertisement.
///
/// Implementations should hand the list off and return quickly; the
/// registry calls this while a caller waits on a service-list change.
pub trait Announcer: Send + Sync {
    fn announce(&self, services: &[String]) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_converts_to_record() {
        let ad = DeviceAdvertisement {
            id: "d1".to_string(),
            ttl: 120,
            platform: "linux".to_string(),
            execution_type: ExecutionType::Native,
            endpoints: vec!["10.0.0.2".to_string(), "10.0.0.2".to_string()],
            services: vec!["ls".to_string()],
            rtt_ms: Some(3.0),
        };

        let record = ad.to_record();

        assert!(!ad.is_expiry());
        assert_eq!(record.endpoints, vec!["10.0.0.2"]);
        assert_eq!(record.rtt_ms, Some(3.0));
    }

    #[test]
    fn missing_rtt_deserializes_as_none() {
        let ad: DeviceAdvertisement = serde_json::from_str(
            r#"{"id":"d1","ttl":0,"platform":"linux","execution_type":"container",
                "endpoints":[],"services":[]}"#,
        )
        .unwrap();

        assert!(ad.is_expiry());
        assert_eq!(ad.rtt_ms, None);
        assert_eq!(ad.execution_type, ExecutionType::Container);
    }
}
