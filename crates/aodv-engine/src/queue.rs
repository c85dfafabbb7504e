//! Bounded FIFO for packets awaiting route discovery.

use std::collections::{HashMap, VecDeque};

use aodv_core::types::Address;

use crate::traits::PacketHeader;

/// A deferred data packet with its admission deadline.
#[derive(Debug, Clone)]
pub struct QueuedPacket {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
    /// Instant past which the packet is discarded.
    pub deadline: u64,
}

/// Why a packet left the queue without being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The global bound was hit and this was the oldest packet.
    Overflow,
    /// The per-destination bound was hit.
    DestinationFull,
    /// The packet waited past its deadline.
    TimedOut,
    /// Discovery for its destination was abandoned.
    Unreachable,
}

/// FIFO of packets waiting for a route, bounded globally and per
/// destination. Overflow evicts the oldest packet overall, so a destination
/// that never resolves cannot starve the rest of the queue forever.
#[must_use]
pub struct PacketQueue {
    packets: VecDeque<QueuedPacket>,
    per_dest: HashMap<Address, usize>,
    max_packets: usize,
    max_per_dest: usize,
}

impl PacketQueue {
    pub fn new(max_packets: usize, max_per_dest: usize) -> Self {
        Self {
            packets: VecDeque::new(),
            per_dest: HashMap::new(),
            max_packets,
            max_per_dest,
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn queued_for(&self, dest: &Address) -> usize {
        self.per_dest.get(dest).copied().unwrap_or(0)
    }

    /// Admit a packet. Returns the packet evicted to make room, if any, or
    /// rejects the new packet itself when its destination is already full.
    pub fn enqueue(
        &mut self,
        header: PacketHeader,
        payload: Vec<u8>,
        deadline: u64,
    ) -> Result<Option<(QueuedPacket, DropReason)>, (QueuedPacket, DropReason)> {
        let dest = header.destination;
        if self.queued_for(&dest) >= self.max_per_dest {
            return Err((
                QueuedPacket {
                    header,
                    payload,
                    deadline,
                },
                DropReason::DestinationFull,
            ));
        }

        let evicted = if self.packets.len() >= self.max_packets {
            self.pop_front().map(|p| (p, DropReason::Overflow))
        } else {
            None
        };

        *self.per_dest.entry(dest).or_insert(0) += 1;
        self.packets.push_back(QueuedPacket {
            header,
            payload,
            deadline,
        });
        Ok(evicted)
    }

    /// Remove every packet bound for a destination, in arrival order. Called
    /// when a route appears (to send them) or when discovery gives up (to
    /// fail them).
    pub fn take_for(&mut self, dest: &Address) -> Vec<QueuedPacket> {
        let mut taken = Vec::new();
        self.packets.retain(|p| {
            if p.header.destination == *dest {
                taken.push(p.clone());
                false
            } else {
                true
            }
        });
        if !taken.is_empty() {
            self.per_dest.remove(dest);
        }
        taken
    }

    /// Discard packets past their deadline, returning them for failure
    /// notification.
    pub fn expire(&mut self, now: u64) -> Vec<QueuedPacket> {
        let mut expired = Vec::new();
        self.packets.retain(|p| {
            if now > p.deadline {
                expired.push(p.clone());
                false
            } else {
                true
            }
        });
        for p in &expired {
            self.decrement(&p.header.destination);
        }
        expired
    }

    /// Earliest deadline among queued packets, for wakeup scheduling.
    pub fn next_deadline(&self) -> Option<u64> {
        self.packets.iter().map(|p| p.deadline).min()
    }

    fn pop_front(&mut self) -> Option<QueuedPacket> {
        let packet = self.packets.pop_front()?;
        self.decrement(&packet.header.destination);
        Some(packet)
    }

    fn decrement(&mut self, dest: &Address) {
        if let Some(count) = self.per_dest.get_mut(dest) {
            *count -= 1;
            if *count == 0 {
                self.per_dest.remove(dest);
            }
        }
    }
}
