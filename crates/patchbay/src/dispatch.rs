//! # Dispatcher
//!
//! The orchestrator. For each inbound message it resolves the origin's
//! scopes, picks the delivery contract, and drives the listener registry,
//! invoke registry, port table and reply channel accordingly.
//!
//! Peers never see router internals: every failure except a malformed port
//! transfer is converted into a structured reply or a skipped no-op at this
//! boundary.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use patchport::{PortTable, RawPortHandle, TransferError};
use serde_json::Value;
use tokio::task::JoinError;

use crate::diag::{DiagnosticSink, TracingSink};
use crate::endpoint::{EndpointDirectory, EndpointResolver};
use crate::event::{BroadcastEvent, Event, PortsEvent, ReturnSlot, SyncEvent};
use crate::invoke::{self, HandlerResult, InvokeRegistry, handler_fn};
use crate::origin::Origin;
use crate::registry::{ListenerRegistry, Subscriber, SubscriberId};
use crate::reply::{Reply, ReplyChannel};
use crate::scope::Scope;

/// The reserved channel of the host-forwarded relay pass-through.
///
/// A message arriving with [`Delivery::Relay`] is forwarded verbatim to the
/// sending surface's own listener set under this name: no scope
/// resolution, no fan-out, no reply. Transports match on this constant.
pub const RELAY_CHANNEL: &str = "host-relay";

/// How an inbound message asks to be delivered. Decoded by the transport.
pub enum Delivery {
    /// Fire-and-forget fan-out.
    Broadcast,
    /// Synchronous fan-out; the return slot's final value goes back through
    /// `reply` once the whole fan-out has run.
    Sync { reply: ReplyChannel },
    /// Single-handler request/response.
    Invoke { reply: ReplyChannel },
    /// Fan-out with a transfer set; `reply` acks the transfer or carries
    /// its rejection.
    PortTransfer {
        transfer: Vec<RawPortHandle>,
        reply: ReplyChannel,
    },
    /// The fixed host-relay pass-through.
    Relay,
}

/// A decoded inbound message, as handed over by the transport.
pub struct Inbound {
    pub channel: String,
    pub args: Vec<Value>,
    pub origin: Origin,
    pub delivery: Delivery,
}

/// The only failures `dispatch` surfaces to its caller directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The transfer set was rejected before any delivery; no port changed
    /// hands.
    MalformedTransfer(TransferError),
    /// Internal origins never carry ports.
    InternalTransfer,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTransfer(error) => write!(f, "malformed transfer: {}", error),
            Self::InternalTransfer => write!(f, "internal origin cannot carry ports"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedTransfer(error) => Some(error),
            Self::InternalTransfer => None,
        }
    }
}

impl From<TransferError> for DispatchError {
    fn from(error: TransferError) -> Self {
        Self::MalformedTransfer(error)
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// The message router.
///
/// Registration methods mutate the registries; `dispatch` only reads them,
/// which is what makes concurrent re-entrant dispatch safe while a handler
/// is suspended.
pub struct Router {
    listeners: ListenerRegistry,
    invokers: InvokeRegistry,
    ports: Arc<PortTable>,
    resolver: EndpointResolver,
    diag: Arc<dyn DiagnosticSink>,
}

impl Router {
    /// A router reporting diagnostics through `tracing`.
    pub fn new(directory: Arc<dyn EndpointDirectory>) -> Self {
        Self::with_diagnostics(directory, Arc::new(TracingSink))
    }

    pub fn with_diagnostics(
        directory: Arc<dyn EndpointDirectory>,
        diag: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            listeners: ListenerRegistry::new(),
            invokers: InvokeRegistry::new(),
            ports: Arc::new(PortTable::new()),
            resolver: EndpointResolver::new(directory),
            diag,
        }
    }

    /// The port table transports register and decode transfer handles
    /// against.
    pub fn port_table(&self) -> Arc<PortTable> {
        self.ports.clone()
    }

    // --- registration surface ---

    /// Subscribes to broadcast/sync/ports deliveries on `(scope, channel)`.
    pub fn on<F>(&self, scope: Scope, channel: impl Into<String>, callback: F) -> SubscriberId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.on(scope, channel, Arc::new(callback) as Subscriber)
    }

    /// Subscribes for a single delivery.
    pub fn once<F>(&self, scope: Scope, channel: impl Into<String>, callback: F) -> SubscriberId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.once(scope, channel, Arc::new(callback) as Subscriber)
    }

    /// Unsubscribes one subscriber. A no-op if it is already gone.
    pub fn off(&self, scope: Scope, channel: &str, id: SubscriberId) {
        self.listeners.off(scope, channel, id);
    }

    /// Drops every subscriber for a `(scope, channel)` key.
    pub fn remove_all(&self, scope: Scope, channel: &str) {
        self.listeners.remove_all(scope, channel);
    }

    pub fn listener_count(&self, scope: Scope, channel: &str) -> usize {
        self.listeners.listener_count(scope, channel)
    }

    /// Registers the invoke handler for `(scope, channel)`. At most one may
    /// exist; a second registration fails and leaves the first intact.
    pub fn handle<F, Fut>(&self, scope: Scope, channel: impl Into<String>, handler: F) -> invoke::Result<()>
    where
        F: Fn(Origin, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.invokers.register(scope, channel, handler_fn(handler))
    }

    /// Registers an invoke handler that is removed the moment it is
    /// selected, before it runs.
    pub fn handle_once<F, Fut>(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        handler: F,
    ) -> invoke::Result<()>
    where
        F: Fn(Origin, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.invokers.register_once(scope, channel, handler_fn(handler))
    }

    /// Unregisters the invoke handler for a pair. A no-op if none exists.
    pub fn remove_handler(&self, scope: Scope, channel: &str) {
        self.invokers.remove(scope, channel);
    }

    /// Tears down everything registered under a scope. Subscribers and
    /// invoke handlers die with their frame, worker or surface.
    pub fn purge_scope(&self, scope: &Scope) {
        self.listeners.purge_scope(scope);
        self.invokers.purge_scope(scope);
    }

    // --- dispatch ---

    /// Routes one inbound message according to its delivery contract.
    ///
    /// Invoke is the only path that suspends (awaiting handler settlement);
    /// broadcast and sync fan-outs run synchronously within the call.
    pub async fn dispatch(&self, inbound: Inbound) -> Result<()> {
        let Inbound {
            channel,
            args,
            origin,
            delivery,
        } = inbound;

        match delivery {
            Delivery::Broadcast => {
                self.deliver_broadcast(channel, args, origin);
                Ok(())
            }
            Delivery::Sync { reply } => {
                self.deliver_sync(channel, args, origin, reply);
                Ok(())
            }
            Delivery::Invoke { reply } => {
                self.deliver_invoke(channel, args, origin, reply).await;
                Ok(())
            }
            Delivery::PortTransfer { transfer, reply } => {
                self.deliver_ports(channel, args, origin, transfer, reply)
            }
            Delivery::Relay => {
                self.deliver_relay(channel, args, origin);
                Ok(())
            }
        }
    }

    /// The broadcast fan-out scope list: the owner notification first for
    /// frame origins, then the resolver's fixed order. Workers never fan
    /// out, and internal messages stay in the internal scope.
    fn fanout_scopes(&self, origin: &Origin) -> Vec<Scope> {
        match origin {
            Origin::Internal => vec![Scope::Internal],
            Origin::Worker { .. } => self
                .resolver
                .resolve(origin)
                .into_iter()
                .filter(|scope| matches!(scope, Scope::Worker(_)))
                .collect(),
            Origin::Frame { .. } => {
                let mut scopes = Vec::with_capacity(4);
                if let Some(surface) = self.resolver.surface_of(origin) {
                    scopes.push(Scope::Owner(surface));
                }
                scopes.extend(self.resolver.resolve(origin));
                scopes
            }
        }
    }

    fn deliver_broadcast(&self, channel: String, args: Vec<Value>, origin: Origin) -> usize {
        let sink = self.resolver.sink_for(&origin);
        let event = Event::Broadcast(BroadcastEvent::new(channel.clone(), args, origin, sink));

        let mut delivered = 0;
        for scope in self.fanout_scopes(&origin) {
            delivered += self.listeners.broadcast(&scope, &channel, &event);
        }
        delivered
    }

    fn deliver_sync(&self, channel: String, args: Vec<Value>, origin: Origin, reply: ReplyChannel) {
        let sink = self.resolver.sink_for(&origin);
        let slot = Arc::new(ReturnSlot::new());
        let event = Event::Sync(SyncEvent::new(
            channel.clone(),
            args,
            origin,
            sink,
            slot.clone(),
        ));

        let mut delivered = 0;
        for scope in self.fanout_scopes(&origin) {
            delivered += self.listeners.broadcast(&scope, &channel, &event);
        }

        if delivered == 0 {
            // Advisory only; the default reply still goes out.
            match self.resolver.surface_of(&origin) {
                Some(surface) => self.diag.warn(&format!(
                    "sync message '{}' from {} had no listeners",
                    channel, surface
                )),
                None => self.diag.warn(&format!(
                    "sync message '{}' from {} had no listeners",
                    channel, origin
                )),
            }
        }

        let value = slot.take().unwrap_or(Value::Null);
        reply.send_reply(Reply::Result(value));
    }

    async fn deliver_invoke(
        &self,
        channel: String,
        args: Vec<Value>,
        origin: Origin,
        reply: ReplyChannel,
    ) {
        let mut selected = None;
        for scope in self.resolver.invoke_candidates(&origin) {
            if let Some(handler) = self.invokers.claim(&scope, &channel) {
                selected = Some(handler);
                break;
            }
        }

        let Some(handler) = selected else {
            reply.send_reply(Reply::Error(format!(
                "No handler registered for '{}'",
                channel
            )));
            return;
        };

        // Settle on a separate task so a panicking handler surfaces as a
        // failed settlement instead of unwinding through the dispatcher.
        let settled = tokio::spawn(async move { handler.invoke(origin, args).await }).await;

        match settled {
            Ok(Ok(value)) => reply.send_reply(Reply::Result(value)),
            Ok(Err(error)) => {
                self.diag.handler_error(&channel, &error.to_string());
                reply.send_reply(Reply::Error(error.to_string()));
            }
            Err(join_error) => {
                let message = describe_join_failure(join_error);
                self.diag.handler_error(&channel, &message);
                reply.send_reply(Reply::Error(message));
            }
        }
    }

    fn deliver_ports(
        &self,
        channel: String,
        args: Vec<Value>,
        origin: Origin,
        transfer: Vec<RawPortHandle>,
        reply: ReplyChannel,
    ) -> Result<()> {
        if matches!(origin, Origin::Internal) {
            reply.send_reply(Reply::Error(DispatchError::InternalTransfer.to_string()));
            return Err(DispatchError::InternalTransfer);
        }

        // All-or-nothing: a rejected set wraps nothing and delivers nothing.
        let ports = match self.ports.wrap_transfer(None, &transfer) {
            Ok(ports) => ports,
            Err(error) => {
                reply.send_reply(Reply::Error(error.to_string()));
                return Err(error.into());
            }
        };

        let event = Event::Ports(PortsEvent::new(channel.clone(), args, origin, ports));
        for scope in self.fanout_scopes(&origin) {
            self.listeners.broadcast(&scope, &channel, &event);
        }

        reply.send_reply(Reply::Result(Value::Null));
        Ok(())
    }

    /// The host-relay pass-through: the sending surface's own listener set,
    /// verbatim, under the same channel name. Deliberately not folded into
    /// the general fan-out.
    fn deliver_relay(&self, channel: String, args: Vec<Value>, origin: Origin) {
        let Some(surface) = self.resolver.surface_of(&origin) else {
            self.diag.warn(&format!(
                "relay '{}' from {} has no live surface",
                channel, origin
            ));
            return;
        };

        let event = Event::Broadcast(BroadcastEvent::new(channel.clone(), args, origin, None));
        self.listeners.broadcast(&Scope::Owner(surface), &channel, &event);
    }
}

fn describe_join_failure(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => {
            if let Some(message) = payload.downcast_ref::<&str>() {
                format!("handler panicked: {}", message)
            } else if let Some(message) = payload.downcast_ref::<String>() {
                format!("handler panicked: {}", message)
            } else {
                "handler panicked".to_string()
            }
        }
        Err(_) => "handler task was cancelled".to_string(),
    }
}
