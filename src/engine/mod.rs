//! The container engine collaborator (§6 External Interfaces).
//!
//! `EngineClient` is the seam between the core (classifier, reducer,
//! reconciler) and the concrete engine: the core only ever depends on this
//! trait, never on `bollard` directly. `bollard_client` is the concrete
//! adapter that makes the binary runnable against a real engine socket.

mod bollard_client;

pub use bollard_client::BollardEngine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::types::InspectSnapshot;

/// A single message off the engine's event stream, already lifted out of
/// the wire format into our own domain shape (§4.3's input).
#[derive(Clone, Debug, Default)]
pub struct EngineMessage {
    pub message_type: String,
    pub action: String,
    pub actor_id: String,
    pub attributes: HashMap<String, String>,
    pub time: Option<DateTime<Utc>>,
}

impl EngineMessage {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// A container known to the engine, as returned by `list` (§6).
#[derive(Clone, Debug)]
pub struct EngineContainerRef {
    pub id: String,
    pub names: Vec<String>,
}

/// The engine collaborator contract. One implementation is provided
/// (`BollardEngine`); tests substitute a fake.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Yields event messages until the stream ends or errors. Modeled as a
    /// single fallible stream rather than separate message/error channels,
    /// since that's the shape the reducer actually consumes from (a channel
    /// the reducer reads serially, §5).
    async fn next_event(&mut self) -> Option<Result<EngineMessage>>;

    /// Lists all containers known to the engine, including non-running ones.
    async fn list(&self) -> Result<Vec<EngineContainerRef>>;

    /// Resolves the current snapshot for a container id. `None` means the
    /// engine no longer knows about it (e.g. raced with a destroy).
    async fn inspect(&self, id: &str) -> Result<Option<InspectSnapshot>>;
}
