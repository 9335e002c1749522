//! # Endpoint Resolution
//!
//! Maps an origin to the listener scopes that currently exist for it. The
//! router owns no lifecycle state: liveness questions are answered by an
//! [`EndpointDirectory`], the boundary to window/session lifecycle
//! management.
//!
//! A scope that cannot currently be resolved is *omitted*, not an error:
//! a frame or worker going away mid-flight is a normal runtime condition.

use std::sync::Arc;

use serde_json::Value;

use crate::origin::{FrameId, FrameTreeNodeId, Origin, ProcessId, SurfaceId, WorkerVersionId};
use crate::scope::Scope;

/// A fire-and-forget outbound path to one specific peer.
///
/// Used by the reply-to-origin capability on broadcast and sync events.
/// Implementations enqueue; they never block the dispatch.
pub trait PeerSink: Send + Sync + 'static {
    fn send(&self, channel: &str, payload: Value);
}

/// The lifecycle boundary: who is still alive, and how to reach them.
///
/// Owned by window/session lifecycle management, outside the router. All
/// lookups are point-in-time answers; the router treats a `false`/`None` as
/// ordinary absence.
pub trait EndpointDirectory: Send + Sync + 'static {
    /// Whether the concrete frame instance is still alive in its slot.
    fn frame_is_live(&self, process: ProcessId, frame: FrameId, node: FrameTreeNodeId) -> bool;

    /// Whether the worker instance is still alive.
    fn worker_is_live(&self, version: WorkerVersionId) -> bool;

    /// The surface owning this origin, if it still exists.
    fn surface_of(&self, origin: &Origin) -> Option<SurfaceId>;

    /// An outbound path back to exactly this origin, if it can still be
    /// reached.
    fn sink_for(&self, origin: &Origin) -> Option<Arc<dyn PeerSink>>;
}

/// Pure scope lookup over an [`EndpointDirectory`].
pub struct EndpointResolver {
    directory: Arc<dyn EndpointDirectory>,
}

impl EndpointResolver {
    pub fn new(directory: Arc<dyn EndpointDirectory>) -> Self {
        Self { directory }
    }

    /// The broadcast scope list for an origin, in fixed priority order:
    /// `[frame-or-worker scope if resolvable, surface scope, global scope]`
    /// for frame/worker origins, and only the internal scope for internal
    /// origins. Absent scopes are omitted.
    pub fn resolve(&self, origin: &Origin) -> Vec<Scope> {
        match origin {
            Origin::Internal => vec![Scope::Internal],
            Origin::Frame { process, frame, node } => {
                let mut scopes = Vec::with_capacity(3);
                if self.directory.frame_is_live(*process, *frame, *node) {
                    scopes.push(Scope::Frame(*node));
                }
                if let Some(surface) = self.directory.surface_of(origin) {
                    scopes.push(Scope::Surface(surface));
                }
                scopes.push(Scope::Global);
                scopes
            }
            Origin::Worker { version } => {
                let mut scopes = Vec::with_capacity(3);
                if self.directory.worker_is_live(*version) {
                    scopes.push(Scope::Worker(*version));
                }
                if let Some(surface) = self.directory.surface_of(origin) {
                    scopes.push(Scope::Surface(surface));
                }
                scopes.push(Scope::Global);
                scopes
            }
        }
    }

    /// The invoke candidate list, in first-match priority order. The global
    /// scope is never a candidate for invoke, only for broadcast.
    pub fn invoke_candidates(&self, origin: &Origin) -> Vec<Scope> {
        match origin {
            Origin::Internal => vec![Scope::Internal],
            Origin::Frame { .. } | Origin::Worker { .. } => self
                .resolve(origin)
                .into_iter()
                .filter(|scope| !matches!(scope, Scope::Global))
                .collect(),
        }
    }

    /// The surface owning an origin, if any.
    pub fn surface_of(&self, origin: &Origin) -> Option<SurfaceId> {
        self.directory.surface_of(origin)
    }

    /// An outbound path back to exactly this origin, if any.
    pub fn sink_for(&self, origin: &Origin) -> Option<Arc<dyn PeerSink>> {
        self.directory.sink_for(origin)
    }
}
