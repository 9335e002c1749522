//! # Listener scopes
//!
//! A scope is a live listener context reachable from an origin. Frame and
//! worker scopes can be absent at dispatch time (their peer may have been
//! torn down); the global and internal scopes live as long as the process.

use std::fmt;

use crate::origin::{FrameTreeNodeId, SurfaceId, WorkerVersionId};

/// A resolvable listener context.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Scope {
    /// The per-frame-slot scope, keyed by the stable logical slot.
    Frame(FrameTreeNodeId),
    /// The per-worker scope.
    Worker(WorkerVersionId),
    /// The per-surface scope of the origin's owning tab/window/worker host.
    Surface(SurfaceId),
    /// A surface's own listener set: the owner-notification target of a
    /// frame broadcast and the relay pass-through target. Never produced by
    /// scope resolution and never an invoke candidate.
    Owner(SurfaceId),
    /// The process-wide scope for messages from untrusted peers.
    Global,
    /// The process-wide scope for messages from trusted in-process code.
    Internal,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(node) => write!(f, "frame-scope({})", node),
            Self::Worker(version) => write!(f, "worker-scope({})", version),
            Self::Surface(surface) => write!(f, "surface-scope({})", surface),
            Self::Owner(surface) => write!(f, "owner-scope({})", surface),
            Self::Global => write!(f, "global-scope"),
            Self::Internal => write!(f, "internal-scope"),
        }
    }
}
