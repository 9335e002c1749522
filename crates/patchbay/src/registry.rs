//! # Listener Registry
//!
//! Ordered broadcast subscribers per `(scope, channel)`, used by the
//! fire-and-forget and sync delivery paths. The registry is mutated only by
//! explicit register/unregister calls; dispatch reads a freshly collected
//! snapshot per fan-out, which is what keeps concurrent re-entrant dispatch
//! safe without per-dispatch locking.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::event::Event;
use crate::scope::Scope;

/// A registered broadcast callback.
pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Strong type for subscriber registrations, used to unregister.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

#[derive(Clone)]
struct Entry {
    id: SubscriberId,
    once: bool,
    callback: Subscriber,
}

/// Broadcast subscribers keyed by `(scope, channel)`, in registration order.
pub struct ListenerRegistry {
    subscribers: DashMap<(Scope, String), Vec<Entry>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber; returns its id for later removal.
    pub fn on(&self, scope: Scope, channel: impl Into<String>, callback: Subscriber) -> SubscriberId {
        self.register(scope, channel, callback, false)
    }

    /// Registers a subscriber that is removed after its first delivery.
    pub fn once(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        callback: Subscriber,
    ) -> SubscriberId {
        self.register(scope, channel, callback, true)
    }

    fn register(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        callback: Subscriber,
        once: bool,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .entry((scope, channel.into()))
            .or_default()
            .push(Entry { id, once, callback });
        id
    }

    /// Unregisters one subscriber. A no-op if it is already gone.
    pub fn off(&self, scope: Scope, channel: &str, id: SubscriberId) {
        if let Some(mut entries) = self.subscribers.get_mut(&(scope, channel.to_string())) {
            entries.retain(|entry| entry.id != id);
        }
    }

    /// Drops every subscriber for a `(scope, channel)` key.
    pub fn remove_all(&self, scope: Scope, channel: &str) {
        self.subscribers.remove(&(scope, channel.to_string()));
    }

    /// Drops everything registered under a scope. Called on scope teardown.
    pub fn purge_scope(&self, scope: &Scope) {
        self.subscribers.retain(|(key_scope, _), _| key_scope != scope);
    }

    pub fn listener_count(&self, scope: Scope, channel: &str) -> usize {
        self.subscribers
            .get(&(scope, channel.to_string()))
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Delivers an event to every subscriber of `(scope, channel)`, in
    /// registration order, and returns how many were invoked. The count is
    /// informational only; it never changes routing.
    ///
    /// A panicking subscriber is caught and logged; one broken callback
    /// must not take down the fan-out, let alone the router.
    pub fn broadcast(&self, scope: &Scope, channel: &str, event: &Event) -> usize {
        let key = (*scope, channel.to_string());
        let snapshot: Vec<Entry> = match self.subscribers.get(&key) {
            Some(entries) => entries.value().clone(),
            None => return 0,
        };

        let mut spent = Vec::new();
        for entry in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(event)));
            if outcome.is_err() {
                tracing::error!(channel, scope = %scope, "subscriber panicked during delivery");
            }
            if entry.once {
                spent.push(entry.id);
            }
        }

        if !spent.is_empty() {
            if let Some(mut entries) = self.subscribers.get_mut(&key) {
                entries.retain(|entry| !spent.contains(&entry.id));
            }
        }

        snapshot.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BroadcastEvent;
    use crate::origin::Origin;
    use std::sync::Mutex;

    fn event(channel: &str) -> Event {
        Event::Broadcast(BroadcastEvent::new(
            channel.to_string(),
            Vec::new(),
            Origin::Internal,
            None,
        ))
    }

    fn counting_subscriber(counter: Arc<Mutex<u32>>) -> Subscriber {
        Arc::new(move |_event| {
            *counter.lock().unwrap() += 1;
        })
    }

    #[test]
    fn test_broadcast_counts_listeners() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Mutex::new(0));
        registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));
        registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));

        let delivered = registry.broadcast(&Scope::Global, "ping", &event("ping"));
        assert_eq!(delivered, 2);
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[test]
    fn test_zero_listeners_is_a_noop() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.broadcast(&Scope::Global, "ping", &event("ping")), 0);
    }

    #[test]
    fn test_off_removes_one_subscriber() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Mutex::new(0));
        let id = registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));
        registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));

        registry.off(Scope::Global, "ping", id);
        assert_eq!(registry.listener_count(Scope::Global, "ping"), 1);

        registry.broadcast(&Scope::Global, "ping", &event("ping"));
        assert_eq!(*counter.lock().unwrap(), 1);

        // Removing an already-removed subscriber is a no-op.
        registry.off(Scope::Global, "ping", id);
    }

    #[test]
    fn test_once_subscriber_fires_exactly_once() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Mutex::new(0));
        registry.once(Scope::Global, "ping", counting_subscriber(counter.clone()));

        registry.broadcast(&Scope::Global, "ping", &event("ping"));
        registry.broadcast(&Scope::Global, "ping", &event("ping"));

        assert_eq!(*counter.lock().unwrap(), 1);
        assert_eq!(registry.listener_count(Scope::Global, "ping"), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_fanout() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Mutex::new(0));
        registry.on(Scope::Global, "ping", Arc::new(|_event| panic!("broken")));
        registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));

        let delivered = registry.broadcast(&Scope::Global, "ping", &event("ping"));
        assert_eq!(delivered, 2);
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn test_purge_scope() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Mutex::new(0));
        registry.on(Scope::Global, "ping", counting_subscriber(counter.clone()));
        registry.on(Scope::Internal, "ping", counting_subscriber(counter.clone()));

        registry.purge_scope(&Scope::Global);
        assert_eq!(registry.listener_count(Scope::Global, "ping"), 0);
        assert_eq!(registry.listener_count(Scope::Internal, "ping"), 1);
    }
}
