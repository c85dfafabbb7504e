//! Neighbor liveness and the unidirectional-link blacklist.

use std::collections::HashMap;

use aodv_core::types::{Address, InterfaceId};

/// A directly connected node we have recently heard from.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub interface: InterfaceId,
    /// Last instant any traffic arrived from this neighbor.
    pub last_heard: u64,
}

/// Tracks which neighbors are alive and which are suspected of hearing us
/// over a link we cannot hear back on. Blacklisted neighbors have their
/// route requests ignored until the suspicion lapses.
#[must_use]
pub struct NeighborTable {
    neighbors: HashMap<Address, Neighbor>,
    blacklist: HashMap<Address, u64>,
    /// Neighbors implicated in a recent link failure. Replies sent through
    /// them demand an acknowledgment until the suspicion lapses or an ack
    /// clears it.
    suspects: HashMap<Address, u64>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self {
            neighbors: HashMap::new(),
            blacklist: HashMap::new(),
            suspects: HashMap::new(),
        }
    }

    /// Record that traffic arrived from a neighbor.
    pub fn touch(&mut self, addr: Address, interface: InterfaceId, now: u64) {
        self.neighbors.insert(
            addr,
            Neighbor {
                interface,
                last_heard: now,
            },
        );
    }

    pub fn get(&self, addr: &Address) -> Option<&Neighbor> {
        self.neighbors.get(addr)
    }

    pub fn remove(&mut self, addr: &Address) -> Option<Neighbor> {
        self.neighbors.remove(addr)
    }

    /// Neighbors silent for longer than the validity window. Removes them
    /// and returns their addresses for link-failure handling.
    pub fn cull_silent(&mut self, now: u64, validity: u64) -> Vec<Address> {
        let dead: Vec<Address> = self
            .neighbors
            .iter()
            .filter(|(_, n)| now.saturating_sub(n.last_heard) > validity)
            .map(|(a, _)| *a)
            .collect();
        for addr in &dead {
            self.neighbors.remove(addr);
        }
        dead
    }

    /// Drop every neighbor reached over a torn-down interface.
    pub fn remove_on_interface(&mut self, iface: InterfaceId) -> Vec<Address> {
        let removed: Vec<Address> = self
            .neighbors
            .iter()
            .filter(|(_, n)| n.interface == iface)
            .map(|(a, _)| *a)
            .collect();
        for addr in &removed {
            self.neighbors.remove(addr);
        }
        removed
    }

    pub fn blacklist(&mut self, addr: Address, until: u64) {
        let slot = self.blacklist.entry(addr).or_insert(until);
        if until > *slot {
            *slot = until;
        }
    }

    pub fn is_blacklisted(&self, addr: &Address, now: u64) -> bool {
        self.blacklist.get(addr).is_some_and(|&until| now <= until)
    }

    /// Drop lapsed blacklist entries.
    pub fn cull_blacklist(&mut self, now: u64) {
        self.blacklist.retain(|_, &mut until| now <= until);
        self.suspects.retain(|_, &mut until| now <= until);
    }

    pub fn suspect(&mut self, addr: Address, until: u64) {
        let slot = self.suspects.entry(addr).or_insert(until);
        if until > *slot {
            *slot = until;
        }
    }

    pub fn is_suspect(&self, addr: &Address, now: u64) -> bool {
        self.suspects.get(addr).is_some_and(|&until| now <= until)
    }

    /// An acknowledgment arrived; the link is bidirectional after all.
    pub fn clear_suspect(&mut self, addr: &Address) {
        self.suspects.remove(addr);
    }

    /// Earliest liveness deadline, for wakeup scheduling.
    pub fn next_deadline(&self, validity: u64) -> Option<u64> {
        self.neighbors
            .values()
            .map(|n| n.last_heard + validity)
            .min()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Neighbor)> {
        self.neighbors.iter()
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        Address::new([10, 0, 0, last])
    }

    #[test]
    fn touch_updates_last_heard() {
        let mut table = NeighborTable::new();
        table.touch(addr(2), InterfaceId(1), 100);
        table.touch(addr(2), InterfaceId(1), 900);
        assert_eq!(table.get(&addr(2)).unwrap().last_heard, 900);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn cull_silent_removes_only_overdue() {
        let mut table = NeighborTable::new();
        table.touch(addr(2), InterfaceId(1), 100);
        table.touch(addr(3), InterfaceId(1), 2900);

        let dead = table.cull_silent(3000, 2000);
        assert_eq!(dead, vec![addr(2)]);
        assert!(table.get(&addr(2)).is_none());
        assert!(table.get(&addr(3)).is_some());
    }

    #[test]
    fn blacklist_expires() {
        let mut table = NeighborTable::new();
        table.blacklist(addr(2), 5000);
        assert!(table.is_blacklisted(&addr(2), 1000));
        assert!(table.is_blacklisted(&addr(2), 5000));
        assert!(!table.is_blacklisted(&addr(2), 5001));
    }

    #[test]
    fn blacklist_never_shortens() {
        let mut table = NeighborTable::new();
        table.blacklist(addr(2), 5000);
        table.blacklist(addr(2), 3000);
        assert!(table.is_blacklisted(&addr(2), 4000));
    }

    #[test]
    fn cull_blacklist_drops_lapsed() {
        let mut table = NeighborTable::new();
        table.blacklist(addr(2), 1000);
        table.blacklist(addr(3), 9000);
        table.cull_blacklist(5000);
        assert!(!table.is_blacklisted(&addr(2), 500));
        assert!(table.is_blacklisted(&addr(3), 5000));
    }

    #[test]
    fn suspicion_cleared_by_ack_or_lapse() {
        let mut table = NeighborTable::new();
        table.suspect(addr(2), 4000);
        assert!(table.is_suspect(&addr(2), 1000));
        assert!(!table.is_suspect(&addr(2), 4001));

        table.suspect(addr(3), 4000);
        table.clear_suspect(&addr(3));
        assert!(!table.is_suspect(&addr(3), 1000));
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut table = NeighborTable::new();
        assert_eq!(table.next_deadline(2000), None);
        table.touch(addr(2), InterfaceId(1), 100);
        table.touch(addr(3), InterfaceId(1), 500);
        assert_eq!(table.next_deadline(2000), Some(2100));
    }
}
