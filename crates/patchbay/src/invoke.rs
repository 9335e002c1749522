//! # Invoke Registry
//!
//! At most one handler per `(scope, channel)`, used by the request/response
//! delivery contract. Registration conflicts are rejected, never silently
//! replaced; removal of a missing entry is a no-op. The at-most-one
//! invariant is about registration; a single handler may be re-entered by
//! any number of concurrent invoke calls.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use serde_json::Value;

use crate::origin::Origin;
use crate::scope::Scope;

/// A failed handler settlement. The message is what the caller sees in its
/// `{"error"}` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// A registered invoke handler.
///
/// May settle synchronously or suspend internally; the dispatcher awaits
/// its settlement without blocking unrelated dispatches.
#[async_trait]
pub trait InvokeHandler: Send + Sync + 'static {
    async fn invoke(&self, origin: Origin, args: Vec<Value>) -> HandlerResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> InvokeHandler for FnHandler<F>
where
    F: Fn(Origin, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn invoke(&self, origin: Origin, args: Vec<Value>) -> HandlerResult {
        (self.0)(origin, args).await
    }
}

/// Adapts an async closure into an [`InvokeHandler`].
pub fn handler_fn<F, Fut>(handler: F) -> Arc<dyn InvokeHandler>
where
    F: Fn(Origin, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(handler))
}

/// Why a handler registration was refused. The registry is unchanged in
/// either case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// A handler already exists for this `(scope, channel)` pair.
    DuplicateHandler { scope: Scope, channel: String },
    /// Owner sets and the global scope take broadcast subscribers only;
    /// they are never invoke candidates.
    UnroutableScope(Scope),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateHandler { scope, channel } => {
                write!(f, "a handler for '{}' is already registered in {}", channel, scope)
            }
            Self::UnroutableScope(scope) => {
                write!(f, "{} cannot take an invoke handler", scope)
            }
        }
    }
}

impl std::error::Error for RegisterError {}

pub type Result<T> = std::result::Result<T, RegisterError>;

struct HandlerEntry {
    handler: Arc<dyn InvokeHandler>,
    once: bool,
}

/// At most one handler per `(scope, channel)`.
pub struct InvokeRegistry {
    handlers: DashMap<(Scope, String), HandlerEntry>,
}

impl InvokeRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Registers a handler. Fails if one already exists for this pair; the
    /// existing handler stays registered and invocable.
    pub fn register(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        handler: Arc<dyn InvokeHandler>,
    ) -> Result<()> {
        self.insert(scope, channel, handler, false)
    }

    /// Registers a handler that is removed at the moment it is selected for
    /// an invoke, before it runs.
    pub fn register_once(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        handler: Arc<dyn InvokeHandler>,
    ) -> Result<()> {
        self.insert(scope, channel, handler, true)
    }

    fn insert(
        &self,
        scope: Scope,
        channel: impl Into<String>,
        handler: Arc<dyn InvokeHandler>,
        once: bool,
    ) -> Result<()> {
        if matches!(scope, Scope::Owner(_) | Scope::Global) {
            return Err(RegisterError::UnroutableScope(scope));
        }
        match self.handlers.entry((scope, channel.into())) {
            MapEntry::Occupied(occupied) => Err(RegisterError::DuplicateHandler {
                scope,
                channel: occupied.key().1.clone(),
            }),
            MapEntry::Vacant(vacant) => {
                vacant.insert(HandlerEntry { handler, once });
                Ok(())
            }
        }
    }

    /// Unregisters the handler for a pair. A no-op if none exists.
    pub fn remove(&self, scope: Scope, channel: &str) {
        self.handlers.remove(&(scope, channel.to_string()));
    }

    /// Drops every handler registered under a scope. Called on scope
    /// teardown.
    pub fn purge_scope(&self, scope: &Scope) {
        self.handlers.retain(|(key_scope, _), _| key_scope != scope);
    }

    pub fn has_handler(&self, scope: Scope, channel: &str) -> bool {
        self.handlers.contains_key(&(scope, channel.to_string()))
    }

    /// Looks up the handler for a pair, removing it first if it was
    /// registered as once-only.
    pub fn claim(&self, scope: &Scope, channel: &str) -> Option<Arc<dyn InvokeHandler>> {
        let key = (*scope, channel.to_string());
        let entry = self.handlers.get(&key)?;
        let handler = entry.handler.clone();
        let once = entry.once;
        drop(entry);
        if once {
            self.handlers.remove_if(&key, |_, entry| entry.once);
        }
        Some(handler)
    }
}

impl Default for InvokeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
