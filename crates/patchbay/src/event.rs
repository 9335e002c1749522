//! # Delivery events
//!
//! One event struct per delivery kind, each exposing only the capabilities
//! valid for that kind: a broadcast event can reply to its origin but has
//! no return slot; a sync event adds the write-once return slot; a ports
//! event carries the wrapped ports. Sending a request-style reply from a
//! broadcast is unrepresentable.

use std::sync::{Arc, Mutex, PoisonError};

use patchport::Port;
use serde_json::Value;

use crate::endpoint::PeerSink;
use crate::origin::Origin;

/// A delivered message, tagged by its delivery kind.
pub enum Event {
    Broadcast(BroadcastEvent),
    Sync(SyncEvent),
    Ports(PortsEvent),
}

impl Event {
    pub fn channel(&self) -> &str {
        match self {
            Self::Broadcast(event) => &event.channel,
            Self::Sync(event) => &event.channel,
            Self::Ports(event) => &event.channel,
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            Self::Broadcast(event) => &event.args,
            Self::Sync(event) => &event.args,
            Self::Ports(event) => &event.args,
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Self::Broadcast(event) => event.origin,
            Self::Sync(event) => event.origin,
            Self::Ports(event) => event.origin,
        }
    }
}

/// A fire-and-forget delivery.
pub struct BroadcastEvent {
    channel: String,
    args: Vec<Value>,
    origin: Origin,
    reply_sink: Option<Arc<dyn PeerSink>>,
}

impl BroadcastEvent {
    pub(crate) fn new(
        channel: String,
        args: Vec<Value>,
        origin: Origin,
        reply_sink: Option<Arc<dyn PeerSink>>,
    ) -> Self {
        Self {
            channel,
            args,
            origin,
            reply_sink,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Sends a message back to the exact origin frame/worker of this event,
    /// not to whichever scope happens to be handling it. Independent of any
    /// reply channel; a no-op if the origin is already gone.
    pub fn reply(&self, channel: &str, payload: Value) {
        if let Some(sink) = &self.reply_sink {
            sink.send(channel, payload);
        }
    }
}

/// A synchronous delivery: a broadcast plus a write-once return slot whose
/// final value is handed back to the caller after the whole fan-out.
pub struct SyncEvent {
    channel: String,
    args: Vec<Value>,
    origin: Origin,
    reply_sink: Option<Arc<dyn PeerSink>>,
    slot: Arc<ReturnSlot>,
}

impl SyncEvent {
    pub(crate) fn new(
        channel: String,
        args: Vec<Value>,
        origin: Origin,
        reply_sink: Option<Arc<dyn PeerSink>>,
        slot: Arc<ReturnSlot>,
    ) -> Self {
        Self {
            channel,
            args,
            origin,
            reply_sink,
            slot,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Same reply-to-origin capability as a broadcast event.
    pub fn reply(&self, channel: &str, payload: Value) {
        if let Some(sink) = &self.reply_sink {
            sink.send(channel, payload);
        }
    }

    /// Writes the synchronous return value. The slot is single-assignment:
    /// the first write binds, later writes are ignored with a warning.
    pub fn set_return_value(&self, value: Value) {
        if !self.slot.set(value) {
            tracing::warn!(
                channel = self.channel.as_str(),
                "sync return value already set, ignoring"
            );
        }
    }
}

/// A port-transfer delivery: a broadcast whose wrapped ports are shared by
/// every listener in the fan-out.
pub struct PortsEvent {
    channel: String,
    args: Vec<Value>,
    origin: Origin,
    ports: Vec<Port>,
}

impl PortsEvent {
    pub(crate) fn new(channel: String, args: Vec<Value>, origin: Origin, ports: Vec<Port>) -> Self {
        Self {
            channel,
            args,
            origin,
            ports,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The ports transferred with this message.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }
}

/// The write-once return slot of a sync delivery.
pub(crate) struct ReturnSlot {
    value: Mutex<Option<Value>>,
}

impl ReturnSlot {
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Returns false if the slot was already written.
    fn set(&self, value: Value) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub(crate) fn take(&self) -> Option<Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
