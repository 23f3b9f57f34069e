//! Client protocol for the hosted realtime database.
//!
//! Reads and writes are JSON over HTTPS against `{path}.json` endpoints,
//! authenticated with an `auth` query parameter. The subscription
//! channel is a long-lived `text/event-stream` response on which the
//! service pushes `put` and `patch` frames for the watched location.
//!
//! Every operation opens an independent request from a cloned handle;
//! nothing here retries, caches, or coordinates between calls.

mod client;
mod error;
mod listener;
mod protocol;

pub use client::{Database, Reference};
pub use error::RemoteWriteError;
pub use listener::{ChildEvent, Subscription};
pub use protocol::{FrameParser, ServerEvent};
