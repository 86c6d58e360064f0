#![forbid(unsafe_code)]

//! Wire format shared by every process of a Mural installation.
//!
//! Processes exchange small JSON datagrams, each an [`Envelope`] carrying one
//! [`WireMessage`]: forwarded touches, coordination updates from an
//! interacting window, position syncs, and table-wide control operations.
//! Delivery is fire-and-forget; see [`codec`] for validation rules.

pub mod codec;
pub mod message;

pub use codec::{MAX_DATAGRAM, WireError, decode, encode};
pub use message::{
    ControlMessage, CoordinationMessage, Envelope, PROTOCOL_VERSION, Payload, SyncMessage,
    TouchMessage, WireMessage,
};
