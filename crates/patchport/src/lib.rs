//! # Patchport
//!
//! Transferable port endpoints with move-only ownership.
//!
//! A port pair is two entangled endpoints of a peer-to-peer conduit. Either
//! endpoint can ride along with a message: it is listed in a transfer set,
//! validated, and *moved* into a freshly wrapped [`Port`] on the receiving
//! side. The sending side's handle is neutered the instant it enters a
//! transfer set, whether or not delivery ever happens.
//!
//! ## Philosophy
//!
//! - **Move, never copy**: an endpoint has exactly one owner at a time.
//!   The [`PortTable`] is the authority on which handles are still live.
//! - **All-or-nothing**: a transfer set is validated as a whole before any
//!   endpoint changes hands. A malformed set leaves every handle untouched.
//! - **Recursive**: a wrapped port can carry further raw handles in its own
//!   messages, so conduits can be threaded arbitrarily deep.

pub mod port;
pub mod table;

pub use port::{Port, PortMessage};
pub use table::{PortId, PortTable, RawPortHandle, TransferError};
