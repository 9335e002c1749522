//! # Patchbay
//!
//! An in-process message router between a privileged host and many peer
//! contexts (render frames and background workers). An inbound message
//! (a channel name, a payload, an origin) is delivered to the registered
//! listener scopes under one of three contracts: fire-and-forget
//! broadcast, synchronous request/response, or asynchronous single-handler
//! invoke. Port endpoints can ride along with a message and move,
//! exclusively, to the receiving side.
//!
//! ## Philosophy
//!
//! - **Typed scopes, explicit absence**: a frame or worker disappearing
//!   mid-flight is an omitted scope, never an error.
//! - **Fan-out is not first-match**: broadcasts reach every resolvable
//!   scope in a fixed order; invokes run at most one handler.
//! - **Peers see payloads, not internals**: every handler failure becomes
//!   a structured `{"result"}`/`{"error"}` reply at the dispatch boundary.
//! - **Registration mutates, dispatch reads**: the registries are only
//!   written by register/unregister calls, so dispatch is safely
//!   re-entrant while a handler is suspended.

pub mod diag;
pub mod dispatch;
pub mod endpoint;
pub mod event;
pub mod invoke;
pub mod origin;
pub mod registry;
pub mod reply;
pub mod scope;

pub use diag::{CaptureSink, DiagnosticSink, TracingSink};
pub use dispatch::{Delivery, DispatchError, Inbound, RELAY_CHANNEL, Router};
pub use endpoint::{EndpointDirectory, EndpointResolver, PeerSink};
pub use event::{BroadcastEvent, Event, PortsEvent, SyncEvent};
pub use invoke::{HandlerError, HandlerResult, InvokeHandler, RegisterError, handler_fn};
pub use origin::{FrameId, FrameTreeNodeId, Origin, ProcessId, SurfaceId, WorkerVersionId};
pub use registry::SubscriberId;
pub use reply::{Reply, ReplyChannel, ReplyError, ReplyReceiver};
pub use scope::Scope;
