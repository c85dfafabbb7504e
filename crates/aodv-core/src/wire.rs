//! Control message wire format parsing and serialization.
//!
//! Four message kinds, each prefixed by a one-byte type tag, with RFC 3561
//! field layouts in network byte order. Every control datagram additionally
//! carries a leading hop-limit byte that intermediate nodes (not the
//! transport) read and decrement.

use crate::constants::{
    reply_flags, request_flags, MessageType, ERROR_DEST_SIZE, ERROR_HEADER_SIZE, MAX_ERROR_DESTS,
    REPLY_ACK_SIZE, REPLY_SIZE, REQUEST_SIZE,
};
use crate::error::WireError;
use crate::types::{Address, RequestId, SeqNum};

/// A route request, broadcast during expanding-ring discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    /// Request a gratuitous reply toward the destination.
    pub gratuitous: bool,
    /// Only the destination itself may answer.
    pub dest_only: bool,
    /// The originator holds no sequence number for the destination.
    pub unknown_seq: bool,
    pub hop_count: u8,
    pub request_id: RequestId,
    pub destination: Address,
    pub dest_seq: SeqNum,
    pub originator: Address,
    pub orig_seq: SeqNum,
}

/// How a route reply should be interpreted.
///
/// A reply whose destination equals its own originator is a keep-alive
/// self-announcement ("hello"), not a reply to any outstanding request.
/// Classification happens exactly once, through [`RouteReply::kind`]; nothing
/// else in the engine compares these two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A reply traveling back toward a requester.
    Forward,
    /// A one-hop keep-alive announcing the sender itself.
    SelfAnnouncement,
}

/// A route reply, unicast back along the reverse route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReply {
    /// The receiver must answer with a reply acknowledgment.
    pub ack_required: bool,
    /// Subnet prefix size in bits (0 for host routes).
    pub prefix_size: u8,
    pub hop_count: u8,
    pub destination: Address,
    pub dest_seq: SeqNum,
    /// The node that originated the matching request.
    pub originator: Address,
    /// Route lifetime granted by the replier, in milliseconds.
    pub lifetime_ms: u32,
}

impl RouteReply {
    pub fn kind(&self) -> ReplyKind {
        if self.destination == self.originator {
            ReplyKind::SelfAnnouncement
        } else {
            ReplyKind::Forward
        }
    }
}

/// A route error listing newly unreachable destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteError {
    /// (unreachable destination, last known sequence number) pairs.
    pub destinations: Vec<(Address, SeqNum)>,
}

impl RouteError {
    /// Build an error message, returning `None` for an empty destination set.
    ///
    /// Panics if given more than [`MAX_ERROR_DESTS`] destinations; callers
    /// split larger batches across messages.
    pub fn new(destinations: Vec<(Address, SeqNum)>) -> Option<Self> {
        assert!(destinations.len() <= MAX_ERROR_DESTS);
        if destinations.is_empty() {
            None
        } else {
            Some(Self { destinations })
        }
    }
}

/// One of the four control messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Request(RouteRequest),
    Reply(RouteReply),
    Error(RouteError),
    ReplyAck,
}

impl ControlMessage {
    /// Parse a control message from wire bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, WireError> {
        let tag = *raw.first().ok_or(WireError::Empty)?;
        let kind = MessageType::from_byte(tag).ok_or(WireError::UnknownType(tag))?;
        match kind {
            MessageType::Request => parse_request(raw).map(ControlMessage::Request),
            MessageType::Reply => parse_reply(raw).map(ControlMessage::Reply),
            MessageType::Error => parse_error(raw).map(ControlMessage::Error),
            MessageType::ReplyAck => {
                if raw.len() < REPLY_ACK_SIZE {
                    return Err(WireError::Truncated {
                        min: REPLY_ACK_SIZE,
                        actual: raw.len(),
                    });
                }
                Ok(ControlMessage::ReplyAck)
            }
        }
    }

    /// Serialize the message to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            ControlMessage::Request(req) => serialize_request(req),
            ControlMessage::Reply(rep) => serialize_reply(rep),
            ControlMessage::Error(err) => serialize_error(err),
            ControlMessage::ReplyAck => vec![MessageType::ReplyAck.to_byte(), 0],
        }
    }
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(raw[offset..offset + 4].try_into().expect("4-byte slice"))
}

fn read_addr(raw: &[u8], offset: usize) -> Address {
    Address::new(raw[offset..offset + 4].try_into().expect("4-byte slice"))
}

fn parse_request(raw: &[u8]) -> Result<RouteRequest, WireError> {
    if raw.len() < REQUEST_SIZE {
        return Err(WireError::Truncated {
            min: REQUEST_SIZE,
            actual: raw.len(),
        });
    }
    let flags = raw[1];
    Ok(RouteRequest {
        gratuitous: flags & request_flags::GRATUITOUS != 0,
        dest_only: flags & request_flags::DEST_ONLY != 0,
        unknown_seq: flags & request_flags::UNKNOWN_SEQ != 0,
        hop_count: raw[3],
        request_id: RequestId(read_u32(raw, 4)),
        destination: read_addr(raw, 8),
        dest_seq: SeqNum(read_u32(raw, 12)),
        originator: read_addr(raw, 16),
        orig_seq: SeqNum(read_u32(raw, 20)),
    })
}

fn serialize_request(req: &RouteRequest) -> Vec<u8> {
    let mut flags = 0u8;
    if req.gratuitous {
        flags |= request_flags::GRATUITOUS;
    }
    if req.dest_only {
        flags |= request_flags::DEST_ONLY;
    }
    if req.unknown_seq {
        flags |= request_flags::UNKNOWN_SEQ;
    }

    let mut raw = Vec::with_capacity(REQUEST_SIZE);
    raw.push(MessageType::Request.to_byte());
    raw.push(flags);
    raw.push(0); // reserved
    raw.push(req.hop_count);
    raw.extend_from_slice(&req.request_id.0.to_be_bytes());
    raw.extend_from_slice(req.destination.as_ref());
    raw.extend_from_slice(&req.dest_seq.0.to_be_bytes());
    raw.extend_from_slice(req.originator.as_ref());
    raw.extend_from_slice(&req.orig_seq.0.to_be_bytes());
    raw
}

fn parse_reply(raw: &[u8]) -> Result<RouteReply, WireError> {
    if raw.len() < REPLY_SIZE {
        return Err(WireError::Truncated {
            min: REPLY_SIZE,
            actual: raw.len(),
        });
    }
    Ok(RouteReply {
        ack_required: raw[1] & reply_flags::ACK_REQUIRED != 0,
        prefix_size: raw[2] & 0x1F,
        hop_count: raw[3],
        destination: read_addr(raw, 4),
        dest_seq: SeqNum(read_u32(raw, 8)),
        originator: read_addr(raw, 12),
        lifetime_ms: read_u32(raw, 16),
    })
}

fn serialize_reply(rep: &RouteReply) -> Vec<u8> {
    let mut raw = Vec::with_capacity(REPLY_SIZE);
    raw.push(MessageType::Reply.to_byte());
    raw.push(if rep.ack_required {
        reply_flags::ACK_REQUIRED
    } else {
        0
    });
    raw.push(rep.prefix_size & 0x1F);
    raw.push(rep.hop_count);
    raw.extend_from_slice(rep.destination.as_ref());
    raw.extend_from_slice(&rep.dest_seq.0.to_be_bytes());
    raw.extend_from_slice(rep.originator.as_ref());
    raw.extend_from_slice(&rep.lifetime_ms.to_be_bytes());
    raw
}

fn parse_error(raw: &[u8]) -> Result<RouteError, WireError> {
    if raw.len() < ERROR_HEADER_SIZE {
        return Err(WireError::Truncated {
            min: ERROR_HEADER_SIZE,
            actual: raw.len(),
        });
    }
    let count = raw[3] as usize;
    if count == 0 {
        return Err(WireError::EmptyErrorMessage);
    }
    if count > MAX_ERROR_DESTS {
        return Err(WireError::TooManyDestinations(count));
    }
    let needed = ERROR_HEADER_SIZE + count * ERROR_DEST_SIZE;
    if raw.len() < needed {
        return Err(WireError::Truncated {
            min: needed,
            actual: raw.len(),
        });
    }

    let mut destinations = Vec::with_capacity(count);
    for i in 0..count {
        let offset = ERROR_HEADER_SIZE + i * ERROR_DEST_SIZE;
        destinations.push((read_addr(raw, offset), SeqNum(read_u32(raw, offset + 4))));
    }
    Ok(RouteError { destinations })
}

fn serialize_error(err: &RouteError) -> Vec<u8> {
    debug_assert!(!err.destinations.is_empty());
    debug_assert!(err.destinations.len() <= MAX_ERROR_DESTS);

    let mut raw = Vec::with_capacity(ERROR_HEADER_SIZE + err.destinations.len() * ERROR_DEST_SIZE);
    raw.push(MessageType::Error.to_byte());
    raw.push(0); // reserved
    raw.push(0); // reserved
    raw.push(err.destinations.len() as u8);
    for (dest, seq) in &err.destinations {
        raw.extend_from_slice(dest.as_ref());
        raw.extend_from_slice(&seq.0.to_be_bytes());
    }
    raw
}

/// A control datagram: one hop-limit byte followed by a control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Remaining hop budget, decremented by intermediate nodes.
    pub ttl: u8,
    pub message: ControlMessage,
}

impl Datagram {
    pub fn new(ttl: u8, message: ControlMessage) -> Self {
        Self { ttl, message }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, WireError> {
        let (&ttl, body) = raw.split_first().ok_or(WireError::Empty)?;
        Ok(Self {
            ttl,
            message: ControlMessage::parse(body)?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let body = self.message.serialize();
        let mut raw = Vec::with_capacity(1 + body.len());
        raw.push(self.ttl);
        raw.extend_from_slice(&body);
        raw
    }
}
