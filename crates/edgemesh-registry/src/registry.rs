//! Device registry — the local view of the fleet.
//!
//! Every device is stored as three partitions in the [`StateStore`]. All
//! writes go through the registry's write lock and one redb transaction, so
//! a reader never observes a device whose partitions disagree.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use edgemesh_scoring::{RttSource, SampleError, SampleResult};
use edgemesh_state::{DeviceRecord, ExecutionType, StateStore};
use tracing::{debug, info, warn};

use crate::discovery::{Announcer, DeviceAdvertisement, DiscoveryOutcome};
use crate::error::{RegistryError, RegistryResult};
use crate::peer::PeerClient;

/// Upper bound on the concatenated length of self-advertised service names.
pub const MAX_ADVERTISEMENT_BYTES: usize = 400;

/// Round-trip time assumed for a known device that was never measured.
/// Large enough that the latency component is close to its floor.
pub const UNMEASURED_RTT_MS: f64 = 1000.0;

/// How this device describes itself at startup.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    pub platform: String,
    pub execution_type: ExecutionType,
    pub endpoints: Vec<String>,
    pub services: Vec<String>,
}

struct Inner {
    self_id: Option<String>,
    announcer: Option<Arc<dyn Announcer>>,
}

impl Inner {
    fn self_id(&self) -> RegistryResult<&str> {
        self.self_id.as_deref().ok_or(RegistryError::NotStarted)
    }
}

/// Registry of known devices, including this one.
///
/// Share it as `Arc<DeviceRegistry>`; it is safe for concurrent readers and
/// serializes writers.
pub struct DeviceRegistry {
    store: StateStore,
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            inner: RwLock::new(Inner {
                self_id: None,
                announcer: None,
            }),
        }
    }

    /// Assign (or reload) this device's id and write its own record.
    ///
    /// Endpoints, platform, and execution type come from `local`. Services
    /// advertised before a restart are kept and `local.services` is added to
    /// them. The id persists across restarts.
    pub fn start(&self, local: LocalDevice) -> RegistryResult<String> {
        let mut inner = self.write();

        let id = match self.store.self_id()? {
            Some(id) => id,
            None => {
                let id = generate_device_id(&local.endpoints);
                self.store.put_self_id(&id)?;
                info!(device_id = %id, "assigned new device id");
                id
            }
        };

        let persisted = self
            .store
            .get_device(&id)?
            .map(|record| record.services)
            .unwrap_or_default();
        let services: Vec<String> = persisted.into_iter().chain(local.services).collect();
        for name in &services {
            check_service_name(name, &local.platform)?;
        }
        let record = DeviceRecord::new(&id, local.execution_type, &local.platform)
            .with_endpoints(local.endpoints)
            .with_services(services);
        check_payload(&record.services)?;

        self.store.put_device(&record, epoch_secs())?;
        inner.self_id = Some(id.clone());

        info!(
            device_id = %id,
            execution_type = %record.execution_type,
            endpoints = ?record.endpoints,
            services = record.services.len(),
            "device registry started"
        );
        Ok(id)
    }

    pub fn is_started(&self) -> bool {
        self.read().self_id.is_some()
    }

    pub fn self_id(&self) -> RegistryResult<String> {
        self.read().self_id().map(str::to_string)
    }

    pub fn self_record(&self) -> RegistryResult<DeviceRecord> {
        let inner = self.read();
        let id = inner.self_id()?;
        self.load(id)
    }

    /// Attach or detach the fleet-wide relay.
    pub fn set_announcer(&self, announcer: Option<Arc<dyn Announcer>>) {
        self.write().announcer = announcer;
    }

    // ── Device records ─────────────────────────────────────────────

    /// Insert or merge a device.
    ///
    /// Endpoints are unioned with the stored ones; the service list,
    /// platform, and execution type are replaced; rtt is refreshed only
    /// when the incoming record carries one. This device's own record is
    /// refused; it changes through [`DeviceRegistry::add_service_name`] and
    /// friends.
    pub fn upsert(&self, record: DeviceRecord) -> RegistryResult<DeviceRecord> {
        let inner = self.write();
        if inner.self_id()? == record.id {
            warn!(device_id = %record.id, "refusing to upsert this device");
            return Err(RegistryError::SelfOverwrite(record.id));
        }
        self.merge_locked(record)
    }

    /// Remove a device. Returns whether it existed.
    pub fn delete(&self, device_id: &str) -> RegistryResult<bool> {
        let inner = self.write();
        if inner.self_id()? == device_id {
            warn!(%device_id, "refusing to delete this device from the registry");
            return Err(RegistryError::SelfRemoval(device_id.to_string()));
        }
        let existed = self.store.delete_device(device_id)?;
        if existed {
            info!(%device_id, "device removed");
        }
        Ok(existed)
    }

    pub fn get(&self, device_id: &str) -> RegistryResult<DeviceRecord> {
        let inner = self.read();
        inner.self_id()?;
        self.load(device_id)
    }

    /// All devices in registry iteration order.
    pub fn list(&self) -> RegistryResult<Vec<DeviceRecord>> {
        let inner = self.read();
        inner.self_id()?;
        Ok(self.store.list_devices()?)
    }

    /// Drop every device except this one. Returns the removed ids.
    pub fn clear_except_self(&self) -> RegistryResult<Vec<String>> {
        let inner = self.write();
        let self_id = inner.self_id()?;
        let removed = self.store.delete_devices_except(self_id)?;
        info!(removed = removed.len(), "registry cleared except self");
        Ok(removed)
    }

    /// Record a fresh round-trip time measurement.
    pub fn update_rtt(&self, device_id: &str, rtt_ms: f64) -> RegistryResult<()> {
        let inner = self.write();
        inner.self_id()?;
        let mut record = self.load(device_id)?;
        record.rtt_ms = Some(rtt_ms);
        self.store.put_device(&record, epoch_secs())?;
        debug!(%device_id, rtt_ms, "rtt updated");
        Ok(())
    }

    // ── Discovery ──────────────────────────────────────────────────

    /// Apply a discovery event. `None` is a resync signal.
    pub fn handle_discovery(
        &self,
        event: Option<DeviceAdvertisement>,
    ) -> RegistryResult<DiscoveryOutcome> {
        let Some(ad) = event else {
            let removed = self.clear_except_self()?;
            return Ok(DiscoveryOutcome::Resynced(removed));
        };

        let inner = self.write();
        let self_id = inner.self_id()?;

        if ad.id == self_id {
            if ad.is_expiry() {
                debug!(device_id = %ad.id, "ignoring expiry of this device");
                return Ok(DiscoveryOutcome::Ignored(ad.id));
            }
            // Our own advertisement echoed back: only learn new addresses.
            let mut record = self.load(self_id)?;
            record.merge_endpoints(&ad.endpoints);
            self.store.put_device(&record, epoch_secs())?;
            return Ok(DiscoveryOutcome::Updated(ad.id));
        }

        if ad.is_expiry() {
            let existed = self.store.delete_device(&ad.id)?;
            info!(device_id = %ad.id, existed, "device expired");
            return Ok(DiscoveryOutcome::Removed { id: ad.id, existed });
        }

        let merged = self.merge_locked(ad.to_record())?;
        debug!(
            device_id = %merged.id,
            endpoints = ?merged.endpoints,
            services = ?merged.services,
            "device discovered"
        );
        Ok(DiscoveryOutcome::Updated(merged.id))
    }

    /// Learn a device's metadata by asking it directly.
    ///
    /// Used when only an id and an address are known (e.g. reported by a
    /// relay without advertisement fields). The round trip of the query is
    /// recorded as the device's rtt.
    pub async fn refresh_from_peer(
        &self,
        device_id: &str,
        endpoint: &str,
        peer: &dyn PeerClient,
    ) -> RegistryResult<DeviceRecord> {
        self.self_id()?;
        let sent = Instant::now();
        let info = peer.get_orchestration_info(endpoint).await?;
        let rtt_ms = sent.elapsed().as_secs_f64() * 1000.0;
        debug!(%device_id, %endpoint, rtt_ms, "orchestration info received");

        let record = DeviceRecord::new(device_id, info.execution_type, info.platform)
            .with_endpoints([endpoint])
            .with_services(info.services)
            .with_rtt(rtt_ms);
        self.upsert(record)
    }

    // ── Self advertisement ─────────────────────────────────────────

    pub fn service_names(&self) -> RegistryResult<Vec<String>> {
        Ok(self.self_record()?.services)
    }

    /// Advertise one more service from this device.
    pub fn add_service_name(&self, name: &str) -> RegistryResult<Vec<String>> {
        self.update_self_services(|services, platform| {
            check_service_name(name, platform)?;
            if services.iter().any(|s| s == name) {
                return Err(RegistryError::DuplicateService(name.to_string()));
            }
            services.push(name.to_string());
            check_payload(services)
        })
    }

    /// Stop advertising a service from this device.
    pub fn remove_service_name(&self, name: &str) -> RegistryResult<Vec<String>> {
        self.update_self_services(|services, _| {
            let before = services.len();
            services.retain(|s| s != name);
            if services.len() == before {
                return Err(RegistryError::ServiceNotAdvertised(name.to_string()));
            }
            Ok(())
        })
    }

    /// Stop advertising every service from this device.
    pub fn reset_service_names(&self) -> RegistryResult<Vec<String>> {
        self.update_self_services(|services, _| {
            services.clear();
            Ok(())
        })
    }

    /// Apply `f` to a copy of the self service list; persist and announce on
    /// success, leave everything untouched on error.
    fn update_self_services<F>(&self, f: F) -> RegistryResult<Vec<String>>
    where
        F: FnOnce(&mut Vec<String>, &str) -> RegistryResult<()>,
    {
        let (services, announcer) = {
            let inner = self.write();
            let self_id = inner.self_id()?;
            let mut record = self.load(self_id)?;
            let mut services = record.services.clone();
            f(&mut services, &record.platform)?;
            record.services = services;
            self.store.put_device(&record, epoch_secs())?;
            (record.services, inner.announcer.clone())
        };

        info!(services = ?services, "self advertisement changed");
        if let Some(announcer) = announcer {
            if let Err(e) = announcer.announce(&services) {
                warn!(error = %e, "failed to re-announce self advertisement");
            }
        }
        Ok(services)
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, device_id: &str) -> RegistryResult<DeviceRecord> {
        self.store
            .get_device(device_id)?
            .ok_or_else(|| RegistryError::NotFound(device_id.to_string()))
    }

    /// Caller must hold the write lock.
    fn merge_locked(&self, incoming: DeviceRecord) -> RegistryResult<DeviceRecord> {
        let merged = match self.store.get_device(&incoming.id)? {
            Some(mut existing) => {
                existing.merge_endpoints(&incoming.endpoints);
                existing.platform = incoming.platform;
                existing.execution_type = incoming.execution_type;
                existing.services = incoming.services;
                if incoming.rtt_ms.is_some() {
                    existing.rtt_ms = incoming.rtt_ms;
                }
                existing
            }
            None => incoming,
        };
        self.store.put_device(&merged, epoch_secs())?;
        Ok(merged)
    }
}

/// This device is 0 ms away. A known device without a measurement is
/// [`UNMEASURED_RTT_MS`] away. Devices missing from the registry have no rtt.
impl RttSource for DeviceRegistry {
    fn rtt_ms(&self, device_id: &str) -> SampleResult<f64> {
        let inner = self.read();
        if inner.self_id.as_deref() == Some(device_id) {
            return Ok(0.0);
        }
        match self.store.get_device(device_id) {
            Ok(Some(record)) => Ok(record.rtt_ms.unwrap_or(UNMEASURED_RTT_MS)),
            _ => Err(SampleError::UnknownRtt(device_id.to_string())),
        }
    }
}

/// Keys of the two leading advertisement slots.
const RESERVED_KEYS: [&str; 2] = ["platform", "execution_type"];

/// Platform and execution-type tokens lead every advertisement, so they
/// cannot double as service names.
fn check_service_name(name: &str, platform: &str) -> RegistryResult<()> {
    if name.is_empty() || name.trim() != name {
        return Err(RegistryError::InvalidServiceName(name.to_string()));
    }
    if name == platform
        || RESERVED_KEYS.contains(&name)
        || ExecutionType::ALL.iter().any(|t| t.as_str() == name)
    {
        return Err(RegistryError::ReservedName(name.to_string()));
    }
    Ok(())
}

fn check_payload(services: &[String]) -> RegistryResult<()> {
    let size: usize = services.iter().map(String::len).sum();
    if size > MAX_ADVERTISEMENT_BYTES {
        return Err(RegistryError::PayloadTooLarge {
            size,
            limit: MAX_ADVERTISEMENT_BYTES,
        });
    }
    Ok(())
}

/// Generate a device id from local addresses and the current time.
fn generate_device_id(endpoints: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    endpoints.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    format!("edge-{:016x}", hasher.finish())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use edgemesh_scoring::ResourceSample;

    use super::*;
    use crate::peer::{OrchestrationInfo, PeerError};

    fn local() -> LocalDevice {
        LocalDevice {
            platform: "linux".to_string(),
            execution_type: ExecutionType::Native,
            endpoints: vec!["10.0.0.1".to_string()],
            services: vec!["ls".to_string()],
        }
    }

    fn started() -> (DeviceRegistry, String) {
        let registry = DeviceRegistry::new(StateStore::open_in_memory().unwrap());
        let id = registry.start(local()).unwrap();
        (registry, id)
    }

    fn peer(id: &str, endpoints: &[&str], services: &[&str]) -> DeviceRecord {
        DeviceRecord::new(id, ExecutionType::Native, "linux")
            .with_endpoints(endpoints.iter().copied())
            .with_services(services.iter().copied())
    }

    fn advert(id: &str, ttl: u32) -> DeviceAdvertisement {
        DeviceAdvertisement {
            id: id.to_string(),
            ttl,
            platform: "linux".to_string(),
            execution_type: ExecutionType::Native,
            endpoints: vec!["10.0.0.9".to_string()],
            services: vec!["ls".to_string()],
            rtt_ms: Some(2.0),
        }
    }

    #[derive(Default)]
    struct RecordingAnnouncer {
        announced: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, services: &[String]) -> Result<(), String> {
            self.announced.lock().unwrap().push(services.to_vec());
            if self.fail { Err("relay down".to_string()) } else { Ok(()) }
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    #[test]
    fn unstarted_registry_reports_not_started() {
        let registry = DeviceRegistry::new(StateStore::open_in_memory().unwrap());

        assert!(!registry.is_started());
        assert!(matches!(registry.get("d1"), Err(RegistryError::NotStarted)));
        assert!(matches!(registry.list(), Err(RegistryError::NotStarted)));
        assert!(matches!(registry.upsert(peer("d1", &[], &[])), Err(RegistryError::NotStarted)));
        assert!(matches!(registry.add_service_name("x"), Err(RegistryError::NotStarted)));
    }

    #[test]
    fn start_writes_self_record() {
        let (registry, id) = started();

        assert!(id.starts_with("edge-"));
        let me = registry.get(&id).unwrap();
        assert_eq!(me.endpoints, vec!["10.0.0.1"]);
        assert_eq!(me.services, vec!["ls"]);
    }

    #[test]
    fn self_id_survives_restart() {
        let store = StateStore::open_in_memory().unwrap();
        let first = DeviceRegistry::new(store.clone()).start(local()).unwrap();
        let second = DeviceRegistry::new(store).start(local()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn restart_keeps_advertised_services() {
        let store = StateStore::open_in_memory().unwrap();
        let first = DeviceRegistry::new(store.clone());
        first.start(local()).unwrap();
        first.add_service_name("cat").unwrap();

        let second = DeviceRegistry::new(store);
        let mut device = local();
        device.endpoints = vec!["10.0.0.5".to_string()];
        second.start(device).unwrap();

        let me = second.self_record().unwrap();
        assert_eq!(me.services, vec!["ls", "cat"]);
        assert_eq!(me.endpoints, vec!["10.0.0.5"]);
    }

    #[test]
    fn lookup_of_unknown_device_is_not_found() {
        let (registry, _) = started();
        assert!(matches!(registry.get("ghost"), Err(RegistryError::NotFound(_))));
    }

    // ── Upsert / delete ────────────────────────────────────────────

    #[test]
    fn upsert_unions_endpoints() {
        let (registry, _) = started();
        registry.upsert(peer("d1", &["10.0.0.2"], &["ls"])).unwrap();
        registry.upsert(peer("d1", &["10.0.0.3"], &["ls"])).unwrap();

        let d1 = registry.get("d1").unwrap();
        assert_eq!(d1.endpoints, vec!["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn upsert_replaces_services_and_keeps_rtt() {
        let (registry, _) = started();
        registry.upsert(peer("d1", &["10.0.0.2"], &["ls", "cat"]).with_rtt(5.0)).unwrap();
        registry.upsert(peer("d1", &["10.0.0.2"], &["top"])).unwrap();

        let d1 = registry.get("d1").unwrap();
        assert_eq!(d1.services, vec!["top"]);
        assert_eq!(d1.rtt_ms, Some(5.0));
    }

    #[test]
    fn delete_never_removes_self() {
        let (registry, id) = started();

        assert!(matches!(registry.delete(&id), Err(RegistryError::SelfRemoval(_))));
        assert!(registry.get(&id).is_ok());
    }

    #[test]
    fn upsert_never_overwrites_self() {
        let (registry, id) = started();
        let oversized = "a".repeat(MAX_ADVERTISEMENT_BYTES + 1);
        let announcer = Arc::new(RecordingAnnouncer::default());
        registry.set_announcer(Some(announcer.clone()));

        let result = registry.upsert(peer(&id, &["10.0.0.8"], &["native", oversized.as_str()]));

        assert!(matches!(result, Err(RegistryError::SelfOverwrite(_))));
        let me = registry.self_record().unwrap();
        assert_eq!(me.services, vec!["ls"]);
        assert_eq!(me.endpoints, vec!["10.0.0.1"]);
        assert!(announcer.announced.lock().unwrap().is_empty());
    }

    #[test]
    fn delete_is_noop_safe() {
        let (registry, _) = started();
        registry.upsert(peer("d1", &[], &[])).unwrap();

        assert!(registry.delete("d1").unwrap());
        assert!(!registry.delete("d1").unwrap());
    }

    #[test]
    fn update_rtt_refreshes_value() {
        let (registry, _) = started();
        registry.upsert(peer("d1", &["10.0.0.2"], &[])).unwrap();

        registry.update_rtt("d1", 12.5).unwrap();

        assert_eq!(registry.get("d1").unwrap().rtt_ms, Some(12.5));
        assert!(matches!(registry.update_rtt("ghost", 1.0), Err(RegistryError::NotFound(_))));
    }

    // ── Discovery ──────────────────────────────────────────────────

    #[test]
    fn discovery_upserts_and_expires() {
        let (registry, _) = started();

        let outcome = registry.handle_discovery(Some(advert("d1", 120))).unwrap();
        assert_eq!(outcome, DiscoveryOutcome::Updated("d1".to_string()));
        assert_eq!(registry.get("d1").unwrap().rtt_ms, Some(2.0));

        let outcome = registry.handle_discovery(Some(advert("d1", 0))).unwrap();
        assert_eq!(
            outcome,
            DiscoveryOutcome::Removed {
                id: "d1".to_string(),
                existed: true
            }
        );
        assert!(registry.get("d1").is_err());
    }

    #[test]
    fn resync_clears_everything_but_self() {
        let (registry, id) = started();
        registry.handle_discovery(Some(advert("d1", 120))).unwrap();
        registry.handle_discovery(Some(advert("d2", 120))).unwrap();

        let outcome = registry.handle_discovery(None).unwrap();

        assert_eq!(
            outcome,
            DiscoveryOutcome::Resynced(vec!["d1".to_string(), "d2".to_string()])
        );
        let remaining = registry.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, id);
    }

    #[test]
    fn expiry_of_self_is_ignored() {
        let (registry, id) = started();

        let outcome = registry.handle_discovery(Some(advert(&id, 0))).unwrap();

        assert_eq!(outcome, DiscoveryOutcome::Ignored(id.clone()));
        assert!(registry.get(&id).is_ok());
    }

    #[test]
    fn self_echo_only_merges_endpoints() {
        let (registry, id) = started();
        let mut echo = advert(&id, 120);
        echo.services = vec!["other".to_string()];

        registry.handle_discovery(Some(echo)).unwrap();

        let me = registry.self_record().unwrap();
        assert_eq!(me.endpoints, vec!["10.0.0.1", "10.0.0.9"]);
        assert_eq!(me.services, vec!["ls"]);
    }

    // ── Self advertisement ─────────────────────────────────────────

    #[test]
    fn add_and_remove_service_names() {
        let (registry, _) = started();

        assert_eq!(registry.add_service_name("cat").unwrap(), vec!["ls", "cat"]);
        assert!(matches!(
            registry.add_service_name("cat"),
            Err(RegistryError::DuplicateService(_))
        ));
        assert_eq!(registry.remove_service_name("ls").unwrap(), vec!["cat"]);
        assert!(matches!(
            registry.remove_service_name("ls"),
            Err(RegistryError::ServiceNotAdvertised(_))
        ));
        assert!(registry.reset_service_names().unwrap().is_empty());
    }

    #[test]
    fn reserved_names_are_rejected() {
        let (registry, _) = started();

        for name in ["native", "container", "android", "linux", "platform", "execution_type"] {
            assert!(matches!(
                registry.add_service_name(name),
                Err(RegistryError::ReservedName(_))
            ));
        }
        assert!(matches!(
            registry.add_service_name(""),
            Err(RegistryError::InvalidServiceName(_))
        ));
    }

    #[test]
    fn oversized_advertisement_is_rejected_unchanged() {
        let (registry, _) = started();
        // "ls" already uses 2 bytes.
        let fits = "a".repeat(MAX_ADVERTISEMENT_BYTES - 2);
        registry.add_service_name(&fits).unwrap();

        let result = registry.add_service_name("b");

        assert!(matches!(
            result,
            Err(RegistryError::PayloadTooLarge { size: 401, limit: 400 })
        ));
        assert_eq!(registry.service_names().unwrap(), vec!["ls".to_string(), fits]);
    }

    #[test]
    fn mutations_are_announced() {
        let (registry, _) = started();
        let announcer = Arc::new(RecordingAnnouncer::default());
        registry.set_announcer(Some(announcer.clone()));

        registry.add_service_name("cat").unwrap();
        registry.remove_service_name("ls").unwrap();
        let _ = registry.add_service_name("cat");

        let announced = announcer.announced.lock().unwrap();
        assert_eq!(announced.len(), 2);
        assert_eq!(announced[1], vec!["cat"]);
    }

    #[test]
    fn announce_failure_is_not_a_caller_error() {
        let (registry, _) = started();
        registry.set_announcer(Some(Arc::new(RecordingAnnouncer {
            announced: Mutex::new(Vec::new()),
            fail: true,
        })));

        assert!(registry.add_service_name("cat").is_ok());
        assert_eq!(registry.service_names().unwrap(), vec!["ls", "cat"]);
    }

    // ── RTT source ─────────────────────────────────────────────────

    #[test]
    fn rtt_source_reads_registry() {
        let (registry, id) = started();
        registry.upsert(peer("d1", &["10.0.0.2"], &[]).with_rtt(8.0)).unwrap();
        registry.upsert(peer("d2", &["10.0.0.3"], &[])).unwrap();

        assert_eq!(registry.rtt_ms(&id).unwrap(), 0.0);
        assert_eq!(registry.rtt_ms("d1").unwrap(), 8.0);
        assert_eq!(registry.rtt_ms("d2").unwrap(), UNMEASURED_RTT_MS);
        assert!(matches!(registry.rtt_ms("ghost"), Err(SampleError::UnknownRtt(_))));
    }

    // ── Peer refresh ───────────────────────────────────────────────

    struct InfoPeer;

    #[async_trait]
    impl PeerClient for InfoPeer {
        async fn get_score(&self, _self_id: &str, endpoint: &str) -> Result<f64, PeerError> {
            Err(PeerError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: "unused".to_string(),
            })
        }

        async fn get_resource(
            &self,
            _self_id: &str,
            endpoint: &str,
        ) -> Result<ResourceSample, PeerError> {
            Err(PeerError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: "unused".to_string(),
            })
        }

        async fn get_orchestration_info(
            &self,
            _endpoint: &str,
        ) -> Result<OrchestrationInfo, PeerError> {
            Ok(OrchestrationInfo {
                platform: "docker".to_string(),
                execution_type: ExecutionType::Container,
                services: vec![],
            })
        }
    }

    #[tokio::test]
    async fn refresh_from_peer_upserts_reported_info() {
        let (registry, _) = started();

        let record = registry
            .refresh_from_peer("d7", "10.0.0.7", &InfoPeer)
            .await
            .unwrap();

        assert_eq!(record.execution_type, ExecutionType::Container);
        let stored = registry.get("d7").unwrap();
        assert_eq!(stored.endpoints, vec!["10.0.0.7"]);
        let rtt = stored.rtt_ms.unwrap();
        assert!(rtt >= 0.0 && rtt < UNMEASURED_RTT_MS);
        assert_eq!(registry.rtt_ms("d7").unwrap(), rtt);
    }
}
