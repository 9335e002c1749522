//! # Wrapped port endpoints
//!
//! A [`Port`] is the exclusively-owned side of a conduit after a transfer.
//! Posting and receiving go through the entangled peer endpoint; nested raw
//! handles in a posted message are themselves transferred (and neutered)
//! at post time.

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::table::{PortId, PortTable, RawPortHandle};
use crate::table;

/// A message travelling over a port conduit: an opaque payload plus any
/// ports that were transferred along with it, already wrapped.
#[derive(Debug)]
pub struct PortMessage {
    pub payload: Value,
    pub ports: Vec<Port>,
}

/// An exclusively-owned port endpoint.
///
/// Produced by [`PortTable::wrap_transfer`]; there is never more than one
/// `Port` for a given endpoint. The receiver half sits behind an async
/// mutex so a port shared by reference across a fan-out can still be read.
#[derive(Debug)]
pub struct Port {
    id: PortId,
    tx: mpsc::UnboundedSender<PortMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<PortMessage>>,
}

impl Port {
    pub(crate) fn new(
        id: PortId,
        tx: mpsc::UnboundedSender<PortMessage>,
        rx: mpsc::UnboundedReceiver<PortMessage>,
    ) -> Self {
        Self {
            id,
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// The id this endpoint was issued under.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Posts a payload to the entangled peer, transferring `transfer` along
    /// with it.
    ///
    /// The transfer set is validated and claimed against `table` before the
    /// message is sent; its handles are neutered even if the peer endpoint
    /// has already been dropped (the message is then silently discarded,
    /// matching a peer that went away mid-flight).
    pub fn post(
        &self,
        table: &PortTable,
        payload: Value,
        transfer: &[RawPortHandle],
    ) -> table::Result<()> {
        let ports = table.wrap_transfer(Some(self.id), transfer)?;
        let _ = self.tx.send(PortMessage { payload, ports });
        Ok(())
    }

    /// Receives the next message from the entangled peer.
    ///
    /// Returns `None` once the peer endpoint has been dropped and the
    /// conduit is drained.
    pub async fn recv(&self) -> Option<PortMessage> {
        self.rx.lock().await.recv().await
    }
}
