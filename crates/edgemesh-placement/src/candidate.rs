//! Candidate resolution — which devices could run a service.

use edgemesh_registry::DeviceRegistry;
use edgemesh_state::ExecutionType;
use tracing::debug;

use crate::error::{PlacementError, PlacementErrorResult};

/// Read-only view of a device considered for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionCandidate {
    pub id: String,
    pub execution_type: ExecutionType,
    pub endpoints: Vec<String>,
}

impl ExecutionCandidate {
    /// The first of this candidate's endpoints that belongs to this device.
    pub fn local_endpoint<'a>(&'a self, self_endpoints: &[String]) -> Option<&'a String> {
        self.endpoints.iter().find(|e| self_endpoints.contains(e))
    }

    pub fn is_local(&self, self_endpoints: &[String]) -> bool {
        self.local_endpoint(self_endpoints).is_some()
    }
}

/// Devices of an accepted type that can run `service_name`, in registry order.
///
/// Container devices qualify whether or not they advertise the service;
/// every other type must advertise it. Devices without endpoints are kept.
pub fn resolve(
    registry: &DeviceRegistry,
    service_name: &str,
    accepted: &[ExecutionType],
) -> PlacementErrorResult<Vec<ExecutionCandidate>> {
    let candidates: Vec<ExecutionCandidate> = registry
        .list()?
        .into_iter()
        .filter(|device| accepted.contains(&device.execution_type))
        .filter(|device| device.execution_type.is_fungible() || device.advertises(service_name))
        .map(|device| ExecutionCandidate {
            id: device.id,
            execution_type: device.execution_type,
            endpoints: device.endpoints,
        })
        .collect();

    if candidates.is_empty() {
        return Err(PlacementError::NotFound(service_name.to_string()));
    }
    debug!(service = %service_name, count = candidates.len(), "resolved candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use edgemesh_registry::LocalDevice;
    use edgemesh_state::{DeviceRecord, StateStore};

    use super::*;

    fn registry() -> DeviceRegistry {
        let registry = DeviceRegistry::new(StateStore::open_in_memory().unwrap());
        registry
            .start(LocalDevice {
                platform: "linux".to_string(),
                execution_type: ExecutionType::Native,
                endpoints: vec!["10.0.0.1".to_string()],
                services: vec![],
            })
            .unwrap();
        registry
    }

    fn add(registry: &DeviceRegistry, id: &str, ty: ExecutionType, endpoints: &[&str], services: &[&str]) {
        registry
            .upsert(
                DeviceRecord::new(id, ty, "linux")
                    .with_endpoints(endpoints.iter().copied())
                    .with_services(services.iter().copied()),
            )
            .unwrap();
    }

    #[test]
    fn containers_are_fungible_others_must_advertise() {
        let registry = registry();
        add(&registry, "c1", ExecutionType::Container, &["10.0.0.2"], &[]);
        add(&registry, "n1", ExecutionType::Native, &["10.0.0.3"], &[]);
        add(&registry, "n2", ExecutionType::Native, &["10.0.0.4"], &["svc"]);

        let found = resolve(
            &registry,
            "svc",
            &[ExecutionType::Container, ExecutionType::Native],
        )
        .unwrap();

        let ids: Vec<_> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "n2"]);
    }

    #[test]
    fn unaccepted_types_are_filtered_out() {
        let registry = registry();
        add(&registry, "c1", ExecutionType::Container, &["10.0.0.2"], &["svc"]);

        let result = resolve(&registry, "svc", &[ExecutionType::Android]);

        assert!(matches!(result, Err(PlacementError::NotFound(_))));
    }

    #[test]
    fn candidates_without_endpoints_are_kept() {
        let registry = registry();
        add(&registry, "n1", ExecutionType::Native, &[], &["svc"]);

        let found = resolve(&registry, "svc", &[ExecutionType::Native]).unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].endpoints.is_empty());
    }

    #[test]
    fn unstarted_registry_is_not_started() {
        let registry = DeviceRegistry::new(StateStore::open_in_memory().unwrap());

        let result = resolve(&registry, "svc", &[ExecutionType::Native]);

        assert!(matches!(result, Err(PlacementError::NotStarted)));
    }

    #[test]
    fn local_endpoint_detection() {
        let candidate = ExecutionCandidate {
            id: "d".into(),
            execution_type: ExecutionType::Native,
            endpoints: vec!["10.0.0.9".into(), "10.0.0.1".into()],
        };
        let mine = vec!["10.0.0.1".to_string()];

        assert_eq!(candidate.local_endpoint(&mine).map(String::as_str), Some("10.0.0.1"));
        assert!(!candidate.is_local(&["10.0.0.5".to_string()]));
    }
}
