//! # Diagnostic sink
//!
//! Where the router sends its advisory warnings and handler failures. The
//! production sink forwards to `tracing`; the capturing sink keeps entries
//! in memory so tests can inspect them.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives router diagnostics. Supplied by the embedding transport layer.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// An advisory condition, e.g. a sync message nobody listened to.
    fn warn(&self, message: &str);

    /// A failed invoke handler settlement on `channel`.
    fn handler_error(&self, channel: &str, message: &str);
}

/// Forwards diagnostics to the `tracing` subscriber.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn handler_error(&self, channel: &str, message: &str) {
        tracing::error!(channel, "error occurred in handler: {}", message);
    }
}

/// Captures diagnostics in memory for inspection.
#[derive(Clone, Default)]
pub struct CaptureSink {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured entries.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl DiagnosticSink for CaptureSink {
    fn warn(&self, message: &str) {
        self.push(format!("[warn] {}", message));
    }

    fn handler_error(&self, channel: &str, message: &str) {
        self.push(format!("[handler:{}] {}", channel, message));
    }
}
