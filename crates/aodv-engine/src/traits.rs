//! Seams between the engine and its host.
//!
//! The engine performs no IO of its own. Each operation borrows a
//! [`Transport`] to emit frames and a [`PacketSink`] to hand data packets
//! back to the host, so the same engine runs under a real socket layer or a
//! test harness interchangeably.

use aodv_core::types::{Address, InterfaceId};

/// Minimal header the engine needs from a data packet. The payload is
/// opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub source: Address,
    pub destination: Address,
    /// Per-source identifier, used for broadcast duplicate suppression.
    pub id: u16,
    /// Remaining hop budget.
    pub ttl: u8,
}

/// Why a data packet could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// No route and discovery is not possible (rate limited, TTL exhausted,
    /// or queue admission failed).
    NoRoute,
    /// Discovery ran out of retries.
    Unreachable,
    /// The packet waited in the queue past its deadline.
    QueueTimeout,
    /// The packet was evicted to admit newer traffic.
    QueueOverflow,
}

/// Frame emission. Implementations prepend nothing; the engine hands over
/// complete datagrams including the hop-limit byte.
pub trait Transport {
    /// Send to every node in range on an interface.
    fn broadcast(&mut self, interface: InterfaceId, payload: &[u8]);

    /// Send to one directly connected node.
    fn unicast(&mut self, interface: InterfaceId, next_hop: Address, payload: &[u8]);
}

/// Where data packets end up once routing has decided their fate.
pub trait PacketSink {
    /// Forward toward the destination through a neighbor.
    fn forward(
        &mut self,
        interface: InterfaceId,
        next_hop: Address,
        header: &PacketHeader,
        payload: &[u8],
    );

    /// The packet is addressed to this node; hand it up the stack.
    fn deliver(&mut self, header: &PacketHeader, payload: &[u8]);

    /// The packet will never be delivered.
    fn fail(&mut self, header: &PacketHeader, payload: &[u8], reason: DeliveryFailure);
}
