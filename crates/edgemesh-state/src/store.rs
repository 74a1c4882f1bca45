//! StateStore — redb-backed state persistence for edgemesh.
//!
//! Exposes a small bucket/key contract (`get`, `put`, `delete`, `list`) plus
//! typed operations for the three device partitions, service policies, and
//! the persisted self id. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Tag a redb error with the storage step that failed.
macro_rules! storage_err {
    ($op:literal) => {
        |e| StateError::Storage {
            op: $op,
            reason: e.to_string(),
        }
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Named key spaces of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    DeviceConfig,
    DeviceNetwork,
    DeviceServices,
    ServicePolicies,
    System,
}

impl Bucket {
    fn table(self) -> Table {
        match self {
            Self::DeviceConfig => DEVICE_CONFIG,
            Self::DeviceNetwork => DEVICE_NETWORK,
            Self::DeviceServices => DEVICE_SERVICES,
            Self::ServicePolicies => SERVICE_POLICIES,
            Self::System => SYSTEM,
        }
    }
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [DEVICE_CONFIG, DEVICE_NETWORK, DEVICE_SERVICES, SERVICE_POLICIES, SYSTEM] {
            txn.open_table(table).map_err(storage_err!("table"))?;
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        Ok(())
    }

    // ── Bucket/key contract ────────────────────────────────────────

    /// Get a value by bucket and key.
    pub fn get<T: DeserializeOwned>(&self, bucket: Bucket, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(storage_err!("transaction"))?;
        let table = txn.open_table(bucket.table()).map_err(storage_err!("table"))?;
        read_value(&table, key)
    }

    /// Insert or replace a value.
    pub fn put<T: Serialize>(&self, bucket: Bucket, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        {
            let mut table = txn.open_table(bucket.table()).map_err(storage_err!("table"))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(storage_err!("write"))?;
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        debug!(?bucket, %key, "value stored");
        Ok(())
    }

    /// Delete a value. Returns true if it existed.
    pub fn delete(&self, bucket: Bucket, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        let existed;
        {
            let mut table = txn.open_table(bucket.table()).map_err(storage_err!("table"))?;
            existed = table.remove(key).map_err(storage_err!("write"))?.is_some();
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        debug!(?bucket, %key, existed, "value deleted");
        Ok(existed)
    }

    /// List all key/value pairs of a bucket in key order.
    pub fn list<T: DeserializeOwned>(&self, bucket: Bucket) -> StateResult<Vec<(String, T)>> {
        let txn = self.db.begin_read().map_err(storage_err!("transaction"))?;
        let table = txn.open_table(bucket.table()).map_err(storage_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(storage_err!("read"))? {
            let (key, value) = entry.map_err(storage_err!("read"))?;
            let decoded: T = serde_json::from_slice(value.value())?;
            results.push((key.value().to_string(), decoded));
        }
        Ok(results)
    }

    // ── Devices ────────────────────────────────────────────────────

    /// Write all three partitions of a device in one transaction.
    pub fn put_device(&self, record: &DeviceRecord, now: u64) -> StateResult<()> {
        let (config, network, services) = record.to_partitions(now);
        let config = serde_json::to_vec(&config)?;
        let network = serde_json::to_vec(&network)?;
        let services = serde_json::to_vec(&services)?;

        let key = record.id.as_str();
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        {
            let mut t = txn.open_table(DEVICE_CONFIG).map_err(storage_err!("table"))?;
            t.insert(key, config.as_slice()).map_err(storage_err!("write"))?;
            let mut t = txn.open_table(DEVICE_NETWORK).map_err(storage_err!("table"))?;
            t.insert(key, network.as_slice()).map_err(storage_err!("write"))?;
            let mut t = txn.open_table(DEVICE_SERVICES).map_err(storage_err!("table"))?;
            t.insert(key, services.as_slice()).map_err(storage_err!("write"))?;
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        debug!(device_id = %key, "device stored");
        Ok(())
    }

    /// Get a device by id, reading all partitions from one snapshot.
    pub fn get_device(&self, device_id: &str) -> StateResult<Option<DeviceRecord>> {
        let txn = self.db.begin_read().map_err(storage_err!("transaction"))?;
        let config_table = txn.open_table(DEVICE_CONFIG).map_err(storage_err!("table"))?;
        let network_table = txn.open_table(DEVICE_NETWORK).map_err(storage_err!("table"))?;
        let services_table = txn.open_table(DEVICE_SERVICES).map_err(storage_err!("table"))?;

        let config: Option<DeviceConfig> = read_value(&config_table, device_id)?;
        let network: Option<DeviceNetwork> = read_value(&network_table, device_id)?;
        let services: Option<DeviceServices> = read_value(&services_table, device_id)?;

        match (config, network, services) {
            (Some(c), Some(n), Some(s)) => Ok(Some(DeviceRecord::from_partitions(c, n, s))),
            (None, None, None) => Ok(None),
            _ => Err(StateError::Inconsistent(device_id.to_string())),
        }
    }

    /// List all devices in key order.
    ///
    /// Fails with [`StateError::Inconsistent`] if any id is missing from
    /// one of the partitions.
    pub fn list_devices(&self) -> StateResult<Vec<DeviceRecord>> {
        let txn = self.db.begin_read().map_err(storage_err!("transaction"))?;
        let config_table = txn.open_table(DEVICE_CONFIG).map_err(storage_err!("table"))?;
        let network_table = txn.open_table(DEVICE_NETWORK).map_err(storage_err!("table"))?;
        let services_table = txn.open_table(DEVICE_SERVICES).map_err(storage_err!("table"))?;

        let config_keys = collect_keys(&config_table)?;
        let network_keys = collect_keys(&network_table)?;
        let services_keys = collect_keys(&services_table)?;
        if let Some(orphan) = network_keys
            .symmetric_difference(&config_keys)
            .chain(services_keys.symmetric_difference(&config_keys))
            .next()
        {
            return Err(StateError::Inconsistent(orphan.clone()));
        }

        let mut results = Vec::with_capacity(config_keys.len());
        for id in &config_keys {
            let config: Option<DeviceConfig> = read_value(&config_table, id)?;
            let network: Option<DeviceNetwork> = read_value(&network_table, id)?;
            let services: Option<DeviceServices> = read_value(&services_table, id)?;
            match (config, network, services) {
                (Some(c), Some(n), Some(s)) => {
                    results.push(DeviceRecord::from_partitions(c, n, s));
                }
                _ => return Err(StateError::Inconsistent(id.clone())),
            }
        }
        Ok(results)
    }

    /// Remove all partitions of a device. Returns true if any existed.
    pub fn delete_device(&self, device_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        let mut existed = false;
        for table in [DEVICE_CONFIG, DEVICE_NETWORK, DEVICE_SERVICES] {
            let mut t = txn.open_table(table).map_err(storage_err!("table"))?;
            existed |= t.remove(device_id).map_err(storage_err!("write"))?.is_some();
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        debug!(%device_id, existed, "device deleted");
        Ok(existed)
    }

    /// Remove every device except `keep_id`. Returns the removed ids.
    pub fn delete_devices_except(&self, keep_id: &str) -> StateResult<Vec<String>> {
        let txn = self.db.begin_write().map_err(storage_err!("transaction"))?;
        let mut removed = BTreeSet::new();
        for table in [DEVICE_CONFIG, DEVICE_NETWORK, DEVICE_SERVICES] {
            let mut t = txn.open_table(table).map_err(storage_err!("table"))?;
            let keys: Vec<String> = collect_keys(&t)?
                .into_iter()
                .filter(|k| k != keep_id)
                .collect();
            for key in keys {
                t.remove(key.as_str()).map_err(storage_err!("write"))?;
                removed.insert(key);
            }
        }
        txn.commit().map_err(storage_err!("transaction"))?;
        debug!(count = removed.len(), "devices cleared");
        Ok(removed.into_iter().collect())
    }

    // ── Service policies ───────────────────────────────────────────

    /// Insert or update a service policy.
    pub fn put_policy(&self, policy: &ServicePolicy) -> StateResult<()> {
        self.put(Bucket::ServicePolicies, &policy.service_name, policy)
    }

    /// Get a service policy by service name.
    pub fn get_policy(&self, service_name: &str) -> StateResult<Option<ServicePolicy>> {
        self.get(Bucket::ServicePolicies, service_name)
    }

    /// List all service policies.
    pub fn list_policies(&self) -> StateResult<Vec<ServicePolicy>> {
        Ok(self
            .list(Bucket::ServicePolicies)?
            .into_iter()
            .map(|(_, policy)| policy)
            .collect())
    }

    /// Delete a service policy. Returns true if it existed.
    pub fn delete_policy(&self, service_name: &str) -> StateResult<bool> {
        self.delete(Bucket::ServicePolicies, service_name)
    }

    // ── System ─────────────────────────────────────────────────────

    /// The persisted id of this device, if one was assigned.
    pub fn self_id(&self) -> StateResult<Option<String>> {
        self.get(Bucket::System, SELF_ID_KEY)
    }

    /// Persist the id of this device.
    pub fn put_self_id(&self, device_id: &str) -> StateResult<()> {
        self.put(Bucket::System, SELF_ID_KEY, &device_id)
    }
}

fn read_value<T, V>(table: &T, key: &str) -> StateResult<Option<V>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    V: DeserializeOwned,
{
    match table.get(key).map_err(storage_err!("read"))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value())?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn collect_keys<T>(table: &T) -> StateResult<BTreeSet<String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut keys = BTreeSet::new();
    for entry in table.iter().map_err(storage_err!("read"))? {
        let (key, _) = entry.map_err(storage_err!("read"))?;
        keys.insert(key.value().to_string());
    }
    Ok(keys)
}
