//! Wire framing for data packets carried between nodes.
//!
//! Control frames start with `[ttl, type 1..=4]`; data frames reuse the
//! leading hop-limit byte and claim type `0`, so a receiver can split the
//! two planes by peeking at the second byte.

use aodv_core::types::Address;
use aodv_engine::traits::PacketHeader;

use crate::error::NodeError;

/// Type tag distinguishing data frames from control messages.
pub const DATA_TYPE: u8 = 0;
/// Hop limit, type, source, destination, packet id.
pub const DATA_HEADER_SIZE: usize = 1 + 1 + 4 + 4 + 2;

/// A data packet as it travels over UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl DataFrame {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATA_HEADER_SIZE + self.payload.len());
        out.push(self.header.ttl);
        out.push(DATA_TYPE);
        out.extend_from_slice(&self.header.source.octets());
        out.extend_from_slice(&self.header.destination.octets());
        out.extend_from_slice(&self.header.id.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(raw: &[u8]) -> Result<Self, NodeError> {
        if raw.len() < DATA_HEADER_SIZE {
            return Err(NodeError::Frame(format!("too short: {} bytes", raw.len())));
        }
        if raw[1] != DATA_TYPE {
            return Err(NodeError::Frame(format!("unexpected type {}", raw[1])));
        }
        let source = Address::new([raw[2], raw[3], raw[4], raw[5]]);
        let destination = Address::new([raw[6], raw[7], raw[8], raw[9]]);
        let id = u16::from_be_bytes([raw[10], raw[11]]);
        Ok(Self {
            header: PacketHeader {
                source,
                destination,
                id,
                ttl: raw[0],
            },
            payload: raw[DATA_HEADER_SIZE..].to_vec(),
        })
    }
}

/// Whether a received frame belongs to the data plane.
pub fn is_data_frame(raw: &[u8]) -> bool {
    raw.len() >= 2 && raw[1] == DATA_TYPE
}
