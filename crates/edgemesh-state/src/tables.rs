//! redb table definitions for the edgemesh state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! The three `DEVICE_*` tables are partitions of one logical device record and
//! share the device id as key.

use redb::TableDefinition;

/// Device platform and execution type keyed by `{device_id}`.
pub const DEVICE_CONFIG: TableDefinition<&str, &[u8]> = TableDefinition::new("device_config");

/// Device endpoints and last RTT keyed by `{device_id}`.
pub const DEVICE_NETWORK: TableDefinition<&str, &[u8]> = TableDefinition::new("device_network");

/// Advertised service names keyed by `{device_id}`.
pub const DEVICE_SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("device_services");

/// Locally registered service policies keyed by `{service_name}`.
pub const SERVICE_POLICIES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("service_policies");

/// Singleton values about this device (e.g. `device_id`).
pub const SYSTEM: TableDefinition<&str, &[u8]> = TableDefinition::new("system");

/// Key under [`SYSTEM`] holding the persisted self device id.
pub const SELF_ID_KEY: &str = "device_id";
