//! # Message origins
//!
//! An origin identifies who sent a message: a render frame, a background
//! worker, or trusted in-process code. It is attached to an inbound message
//! by the transport and never changes afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strong type for peer process identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process-{}", self.0)
    }
}

/// Strong type for a concrete live frame instance within its process.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Strong type for a logical frame slot.
///
/// Stable across navigations and process swaps of the same slot, while
/// [`ProcessId`]/[`FrameId`] identify the concrete instance currently
/// occupying it.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTreeNodeId(pub u64);

impl fmt::Display for FrameTreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Strong type for a background worker instance.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerVersionId(pub u64);

impl fmt::Display for WorkerVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Strong type for the surface (tab, window, worker host) owning an origin.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// The identity of the peer that sent a message.
///
/// Immutable once attached to an inbound message; an origin never "becomes"
/// another variant.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// A render surface, identified both by its concrete live instance
    /// (`process`/`frame`) and its stable logical slot (`node`).
    Frame {
        process: ProcessId,
        frame: FrameId,
        node: FrameTreeNodeId,
    },
    /// A background worker instance.
    Worker { version: WorkerVersionId },
    /// Trusted in-process code, bypassing per-frame scoping.
    Internal,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame { process, frame, node } => {
                write!(f, "frame({}, {}, {})", process, frame, node)
            }
            Self::Worker { version } => write!(f, "worker({})", version),
            Self::Internal => write!(f, "internal"),
        }
    }
}
