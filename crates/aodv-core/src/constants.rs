//! Protocol constants: message type tags, wire sizes, and the control port.

/// Well-known UDP port for all AODV control traffic.
pub const CONTROL_PORT: u16 = 654;

/// Message type tags (first byte of every control message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Request = 1,
    Reply = 2,
    Error = 3,
    ReplyAck = 4,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageType::Request),
            2 => Some(MessageType::Reply),
            3 => Some(MessageType::Error),
            4 => Some(MessageType::ReplyAck),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Route request wire size: type(1) + flags(1) + reserved(1) + hop_count(1)
/// + request_id(4) + dest(4) + dest_seq(4) + orig(4) + orig_seq(4).
pub const REQUEST_SIZE: usize = 24;

/// Route reply wire size: type(1) + flags(1) + prefix(1) + hop_count(1)
/// + dest(4) + dest_seq(4) + orig(4) + lifetime(4).
pub const REPLY_SIZE: usize = 20;

/// Route error header size: type(1) + reserved(2) + dest_count(1).
pub const ERROR_HEADER_SIZE: usize = 4;

/// Bytes per unreachable destination in a route error: addr(4) + seq(4).
pub const ERROR_DEST_SIZE: usize = 8;

/// Reply acknowledgment wire size: type(1) + reserved(1).
pub const REPLY_ACK_SIZE: usize = 2;

/// Conservative MTU assumed for control datagrams.
pub const CONTROL_MTU: usize = 1400;

/// Maximum unreachable destinations carried by one route error message.
///
/// Larger invalidation batches are split across multiple messages.
pub const MAX_ERROR_DESTS: usize = (CONTROL_MTU - 1 - ERROR_HEADER_SIZE) / ERROR_DEST_SIZE;

/// Route request flag bits.
pub mod request_flags {
    /// Gratuitous reply requested.
    pub const GRATUITOUS: u8 = 0b1000_0000;
    /// Only the destination may answer.
    pub const DEST_ONLY: u8 = 0b0100_0000;
    /// The destination sequence number is unknown.
    pub const UNKNOWN_SEQ: u8 = 0b0010_0000;
}

/// Route reply flag bits.
pub mod reply_flags {
    /// Acknowledgment required.
    pub const ACK_REQUIRED: u8 = 0b1000_0000;
}
