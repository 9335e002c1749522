//! # Port Table
//!
//! Tracks every port endpoint issued in this process and enforces move-only
//! transfer semantics. Validation of a transfer set and the neutering of its
//! handles happen under one lock, so no two concurrent transfers can both
//! see a handle as still live.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::port::{Port, PortMessage};

/// Strong type for port endpoint identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortId(pub u64);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

/// A wire-level token naming a port endpoint in the table.
///
/// Raw handles are what a transport decodes out of an inbound message's
/// transfer list. They are cheap references, not owners: ownership of the
/// underlying conduit stays with the [`PortTable`] until
/// [`PortTable::wrap_transfer`] moves it into a [`Port`].
///
/// A `null` handle models an absent or unparseable slot in a decoded
/// transfer list; it is always rejected at validation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortHandle {
    id: Option<PortId>,
}

impl RawPortHandle {
    /// A token naming an endpoint by id.
    pub fn from_id(id: PortId) -> Self {
        Self { id: Some(id) }
    }

    /// The null token: an absent slot decoded from the wire.
    pub fn null() -> Self {
        Self { id: None }
    }

    /// The endpoint this token names, if any.
    pub fn id(&self) -> Option<PortId> {
        self.id
    }
}

/// Reasons a transfer set is malformed.
///
/// Any one of these rejects the whole set before a single endpoint moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The set contains a null/absent handle.
    NullHandle,
    /// The set contains the same handle twice.
    DuplicateHandle(PortId),
    /// The handle was already consumed by a prior transfer.
    AlreadyNeutered(PortId),
    /// The set would make a port carry itself.
    SelfContained(PortId),
    /// The handle names an id this table never issued, or an endpoint
    /// already wrapped away.
    UnknownHandle(PortId),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullHandle => write!(f, "transfer set contains a null port handle"),
            Self::DuplicateHandle(id) => write!(f, "transfer set contains {} twice", id),
            Self::AlreadyNeutered(id) => {
                write!(f, "{} was already consumed by a prior transfer", id)
            }
            Self::SelfContained(id) => write!(f, "{} cannot be carried by its own message", id),
            Self::UnknownHandle(id) => write!(f, "{} does not name a live port endpoint", id),
        }
    }
}

impl std::error::Error for TransferError {}

pub type Result<T> = std::result::Result<T, TransferError>;

/// A live endpoint waiting in the table: the two halves of its conduit.
struct Endpoint {
    tx: mpsc::UnboundedSender<PortMessage>,
    rx: mpsc::UnboundedReceiver<PortMessage>,
}

struct TableState {
    live: HashMap<PortId, Endpoint>,
    spent: HashSet<PortId>,
}

/// Registry of port endpoints with move-only transfer semantics.
///
/// Endpoints are created in entangled pairs and sit in the table until a
/// transfer wraps them into exclusively-owned [`Port`]s. A handle that has
/// been through a transfer is spent forever.
pub struct PortTable {
    next_id: AtomicU64,
    state: Mutex<TableState>,
}

impl PortTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(TableState {
                live: HashMap::new(),
                spent: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates an entangled pair of endpoints.
    ///
    /// Messages posted on either endpoint arrive at the other. Both start
    /// out owned by the table; a transfer moves them into [`Port`]s.
    pub fn create_channel(&self) -> (RawPortHandle, RawPortHandle) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let id_a = PortId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let id_b = PortId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut state = self.lock();
        state.live.insert(id_a, Endpoint { tx: tx_a, rx: rx_b });
        state.live.insert(id_b, Endpoint { tx: tx_b, rx: rx_a });

        (RawPortHandle::from_id(id_a), RawPortHandle::from_id(id_b))
    }

    /// Validates a transfer set and moves each endpoint into a [`Port`].
    ///
    /// `carrier` is the endpoint the message is travelling over, if any; a
    /// set that lists the carrier itself is self-containing and rejected.
    ///
    /// Validation is all-or-nothing: on any rejection no endpoint changes
    /// hands and every handle in the set remains exactly as usable as it
    /// was. On success every handle in the set is spent, regardless of what
    /// later happens to the wrapped ports.
    pub fn wrap_transfer(
        &self,
        carrier: Option<PortId>,
        handles: &[RawPortHandle],
    ) -> Result<Vec<Port>> {
        let mut ids = Vec::with_capacity(handles.len());
        let mut seen = HashSet::with_capacity(handles.len());
        for handle in handles {
            let id = handle.id().ok_or(TransferError::NullHandle)?;
            if !seen.insert(id) {
                return Err(TransferError::DuplicateHandle(id));
            }
            if carrier == Some(id) {
                return Err(TransferError::SelfContained(id));
            }
            ids.push(id);
        }

        // Check and claim under one lock so concurrent transfers cannot
        // both see the same handle as live.
        let mut state = self.lock();
        for &id in &ids {
            if state.spent.contains(&id) {
                return Err(TransferError::AlreadyNeutered(id));
            }
            if !state.live.contains_key(&id) {
                return Err(TransferError::UnknownHandle(id));
            }
        }

        let mut ports = Vec::with_capacity(ids.len());
        for &id in &ids {
            if let Some(endpoint) = state.live.remove(&id) {
                state.spent.insert(id);
                ports.push(Port::new(id, endpoint.tx, endpoint.rx));
            }
        }
        Ok(ports)
    }

    /// Whether a handle has been consumed by a transfer.
    pub fn is_spent(&self, id: PortId) -> bool {
        self.lock().spent.contains(&id)
    }

    /// Whether a handle still names an endpoint waiting in the table.
    pub fn is_live(&self, id: PortId) -> bool {
        self.lock().live.contains_key(&id)
    }
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new()
    }
}
