//! edgemesh-registry — the fleet device registry.
//!
//! Tracks every known device (including this one), what it can run, and
//! where it can be reached. Fed by discovery events and by local
//! self-advertisement changes.
//!
//! # Architecture
//!
//! ```text
//! Discovery transport ──► DeviceRegistry::handle_discovery
//!   ├── Some(ad), ttl > 0 → upsert (endpoint union, service replace, rtt)
//!   ├── Some(ad), ttl = 0 → delete (never self)
//!   └── None             → resync: clear every non-self device
//!
//! DeviceRegistry
//!   ├── RwLock (serializes every multi-partition write)
//!   ├── StateStore (device_config / device_network / device_services)
//!   └── Announcer (re-publishes self services after a local change)
//! ```

pub mod discovery;
pub mod error;
pub mod peer;
pub mod registry;

pub use discovery::{Announcer, DeviceAdvertisement, DiscoveryOutcome};
pub use error::{RegistryError, RegistryResult};
pub use peer::{OrchestrationInfo, PeerClient, PeerError};
pub use registry::{DeviceRegistry, LocalDevice, MAX_ADVERTISEMENT_BYTES, UNMEASURED_RTT_MS};
