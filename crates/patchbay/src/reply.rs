//! # Reply Channel
//!
//! A single-use sink back to the originating peer, produced by the
//! transport per inbound sync/invoke/port-transfer request and consumed
//! exactly once. Peers only ever see structured `{"result"}`/`{"error"}`
//! payloads through it.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// The structured payload sent back through a reply channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    /// Encoded as `{"result": …}`.
    Result(Value),
    /// Encoded as `{"error": …}`.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The responder was dropped before ever settling; injected by the
    /// transport so the waiting side does not hang forever.
    NeverSent,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverSent => write!(f, "reply was never sent"),
        }
    }
}

impl std::error::Error for ReplyError {}

pub type Result<T> = std::result::Result<T, ReplyError>;

/// The sending half of a reply channel.
///
/// Logically single-use: the first `send_reply` consumes the underlying
/// sender. A second call is a broken invariant in the router or transport,
/// not a recoverable condition: it panics under debug assertions and is
/// logged and ignored in release builds.
#[derive(Debug)]
pub struct ReplyChannel {
    tx: Mutex<Option<oneshot::Sender<Reply>>>,
}

/// The waiting half, held by the transport (or a synchronous caller).
#[derive(Debug)]
pub struct ReplyReceiver {
    rx: oneshot::Receiver<Reply>,
}

impl ReplyChannel {
    /// Creates a connected channel/receiver pair.
    pub fn channel() -> (ReplyChannel, ReplyReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            ReplyChannel {
                tx: Mutex::new(Some(tx)),
            },
            ReplyReceiver { rx },
        )
    }

    /// Sends the reply, consuming the channel's single use.
    ///
    /// A receiver that stopped waiting is not an error; the reply is simply
    /// dropped.
    pub fn send_reply(&self, reply: Reply) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => {
                tracing::error!(?reply, "reply channel used twice");
                debug_assert!(false, "reply channel used twice");
            }
        }
    }

    /// Whether the single use has already been spent.
    pub fn is_consumed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl ReplyReceiver {
    /// Waits for the reply.
    ///
    /// Resolves to [`ReplyError::NeverSent`] if the sending half is dropped
    /// without ever settling, the terminal signal that keeps an abandoned
    /// request from hanging its caller forever.
    pub async fn recv(self) -> Result<Reply> {
        self.rx.await.map_err(|_| ReplyError::NeverSent)
    }
}
