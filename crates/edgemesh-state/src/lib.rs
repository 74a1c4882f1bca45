//! edgemesh-state — embedded state store for edgemesh.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for the device registry partitions, local service policies, and
//! the persisted identity of this device.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! A device is split across three tables (`device_config`, `device_network`,
//! `device_services`) keyed by the same device id; the store writes and
//! removes all three inside one write transaction so readers never see a
//! partially written device.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{Bucket, StateStore};
pub use types::*;
