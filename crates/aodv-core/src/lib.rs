//! Wire messages and primitive types for the AODV routing protocol.
//!
//! This crate holds everything that crosses the wire or names a protocol
//! entity: addresses, sequence numbers, the four control messages, and the
//! hop-limit datagram framing. It performs no IO and keeps no state.

pub mod constants;
pub mod error;
pub mod types;
pub mod wire;

pub use error::WireError;
pub use types::{Address, InterfaceId, RequestId, SeqNum};
pub use wire::{ControlMessage, Datagram, ReplyKind, RouteError, RouteReply, RouteRequest};
