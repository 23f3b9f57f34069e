//! Rolodex
//!
//! Client library for a vendor-hosted realtime database, exposing a
//! customer directory: create, update, delete and read records in one
//! remote collection, plus a live subscription to its changes.
//!
//! The sync engine, replication, and conflict handling all live on the
//! service side; this crate only speaks the service's client protocol
//! (JSON over HTTPS for reads and writes, a `text/event-stream` channel
//! for subscriptions).

pub mod config;
pub mod models;
pub mod remote;
pub mod store;

pub use config::{ConfigError, ServiceConfig};
pub use models::Customer;
pub use remote::{ChildEvent, Database, Reference, RemoteWriteError, Subscription};
pub use store::{CustomerEvent, CustomerEvents, CustomerStore, CUSTOMERS_PATH};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
