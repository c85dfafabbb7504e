//! Newtype wrappers for protocol primitives.
//!
//! These types prevent accidental mixing of values that share an underlying
//! integer representation: node addresses, sequence numbers, request ids and
//! interface ids all travel through the same handful of wire fields.

use core::fmt;

/// A node address, IPv4-style (four octets, network byte order on the wire).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Address(pub(crate) [u8; 4]);

impl Address {
    /// The limited broadcast address, `255.255.255.255`.
    pub const BROADCAST: Address = Address([0xFF; 4]);

    /// The unspecified address, `0.0.0.0`.
    pub const UNSPECIFIED: Address = Address([0; 4]);

    pub const fn new(octets: [u8; 4]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits.to_be_bytes())
    }

    pub fn to_bits(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Whether this is the limited broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 4]> for Address {
    fn from(octets: [u8; 4]) -> Self {
        Self(octets)
    }
}

impl From<std::net::Ipv4Addr> for Address {
    fn from(ip: std::net::Ipv4Addr) -> Self {
        Self(ip.octets())
    }
}

impl From<Address> for std::net::Ipv4Addr {
    fn from(addr: Address) -> Self {
        std::net::Ipv4Addr::from(addr.0)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 4] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 4,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// A destination sequence number.
///
/// Sequence numbers are monotonic freshness counters that wrap; comparison
/// uses signed 32-bit rollover arithmetic per RFC 3561 §6.1, so a number that
/// recently wrapped still compares newer than one from before the wrap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[must_use]
pub struct SeqNum(pub u32);

impl SeqNum {
    pub const ZERO: SeqNum = SeqNum(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Rollover-aware "strictly newer than".
    pub fn newer_than(&self, other: SeqNum) -> bool {
        (self.0.wrapping_sub(other.0) as i32) > 0
    }

    /// Rollover-aware "at least as new as".
    pub fn at_least(&self, other: SeqNum) -> bool {
        !other.newer_than(*self)
    }

    /// The next sequence number in order.
    pub fn next(&self) -> SeqNum {
        SeqNum(self.0.wrapping_add(1))
    }

    /// Advance in place.
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNum({})", self.0)
    }
}

/// A route request id, unique per originator within the discovery window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct RequestId(pub u32);

impl RequestId {
    pub fn next(&self) -> RequestId {
        RequestId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lightweight stable interface identifier.
///
/// The transport collaborator owns the mapping from this id to sockets and
/// addresses; the engine only ever addresses interfaces by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u32);

/// Error for fixed-length conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid length: expected {expected}, got {actual}")]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display_dotted_quad() {
        let addr = Address::new([192, 168, 1, 7]);
        assert_eq!(addr.to_string(), "192.168.1.7");
    }

    #[test]
    fn address_bits_roundtrip() {
        let addr = Address::new([10, 0, 0, 42]);
        assert_eq!(Address::from_bits(addr.to_bits()), addr);
        assert_eq!(addr.to_bits(), 0x0A00_002A);
    }

    #[test]
    fn address_try_from_wrong_length() {
        let err = Address::try_from([1u8, 2, 3].as_slice()).unwrap_err();
        assert_eq!(err, InvalidLength { expected: 4, actual: 3 });
    }

    #[test]
    fn broadcast_detection() {
        assert!(Address::BROADCAST.is_broadcast());
        assert!(!Address::new([10, 0, 0, 255]).is_broadcast());
    }

    #[test]
    fn seq_ordering_simple() {
        assert!(SeqNum(5).newer_than(SeqNum(4)));
        assert!(!SeqNum(4).newer_than(SeqNum(5)));
        assert!(!SeqNum(5).newer_than(SeqNum(5)));
        assert!(SeqNum(5).at_least(SeqNum(5)));
        assert!(SeqNum(5).at_least(SeqNum(3)));
        assert!(!SeqNum(3).at_least(SeqNum(5)));
    }

    #[test]
    fn seq_ordering_across_rollover() {
        // A sequence number just past the wrap is newer than one just before it.
        assert!(SeqNum(2).newer_than(SeqNum(u32::MAX - 1)));
        assert!(!SeqNum(u32::MAX - 1).newer_than(SeqNum(2)));
    }

    #[test]
    fn seq_increment_wraps() {
        let mut seq = SeqNum(u32::MAX);
        seq.increment();
        assert_eq!(seq, SeqNum(0));
        assert_eq!(SeqNum(u32::MAX).next(), SeqNum(0));
    }

    #[test]
    fn request_id_wraps() {
        assert_eq!(RequestId(u32::MAX).next(), RequestId(0));
    }
}
