//! Routing table mapping destinations to route state.
//!
//! The table exclusively owns its entries. Timers and the packet queue refer
//! to entries by destination address only, so a deleted entry turns every
//! pending timer into a "not found" no-op instead of a dangling reference.

use std::collections::{BTreeSet, HashMap};

use aodv_core::types::{Address, InterfaceId, SeqNum};

/// Lifecycle state of a route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// Usable; lifetime is in the future.
    Valid,
    /// Known but unusable; retained so errors can still carry the last
    /// known sequence number.
    Invalid,
    /// A discovery for this destination is outstanding.
    InSearch,
}

/// One route, keyed by destination.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub destination: Address,
    /// Next hop toward the destination; `None` once invalidated.
    pub next_hop: Option<Address>,
    /// Egress interface the route was learned on.
    pub interface: Option<InterfaceId>,
    pub hop_count: u8,
    pub seq: SeqNum,
    /// Whether `seq` carries real information.
    pub seq_known: bool,
    pub state: RouteState,
    /// Absolute expiry: end of validity while Valid, deletion deadline while
    /// Invalid.
    pub expires: u64,
    /// Current ring-search scope while in search.
    pub ttl: u8,
    /// Discovery attempts made at maximum TTL.
    pub retries: u8,
    /// Neighbors routing through this node toward the destination.
    pub precursors: BTreeSet<Address>,
}

impl RouteEntry {
    /// A fresh entry in discovery state, before any route is known.
    pub fn in_search(destination: Address, ttl: u8, expires: u64) -> Self {
        Self {
            destination,
            next_hop: None,
            interface: None,
            hop_count: 0,
            seq: SeqNum::ZERO,
            seq_known: false,
            state: RouteState::InSearch,
            expires,
            ttl,
            retries: 0,
            precursors: BTreeSet::new(),
        }
    }

    pub fn is_valid(&self, now: u64) -> bool {
        self.state == RouteState::Valid && now <= self.expires
    }

    /// Extend the lifetime; never shortens it.
    pub fn refresh(&mut self, until: u64) {
        if until > self.expires {
            self.expires = until;
        }
    }
}

/// A candidate route offered by a received request or reply.
#[derive(Debug, Clone, Copy)]
pub struct RouteCandidate {
    pub next_hop: Address,
    pub interface: InterfaceId,
    pub hop_count: u8,
    pub seq: SeqNum,
    pub seq_known: bool,
    /// Absolute lifetime the candidate grants.
    pub expires: u64,
}

/// The strictly ordered replace policy.
///
/// A candidate replaces the existing entry when, in order: the existing
/// sequence number is unknown; the candidate's is strictly newer; they are
/// equal and the existing entry is not usable; or they are equal, both
/// usable, and the candidate is strictly shorter. This ordering is what
/// keeps the protocol loop-free.
pub fn should_replace(existing: &RouteEntry, candidate: &RouteCandidate, now: u64) -> bool {
    if !existing.seq_known {
        return true;
    }
    if !candidate.seq_known {
        return false;
    }
    if candidate.seq.newer_than(existing.seq) {
        return true;
    }
    if candidate.seq != existing.seq {
        return false;
    }
    if !existing.is_valid(now) {
        return true;
    }
    candidate.hop_count < existing.hop_count
}

/// Outcome of a table sweep.
#[derive(Debug, Default)]
pub struct PurgeOutcome {
    /// Valid entries whose lifetime elapsed, now Invalid.
    pub invalidated: Vec<Address>,
    /// Invalid entries past their deletion deadline, now gone.
    pub deleted: Vec<Address>,
}

/// Destination-keyed routing table.
#[must_use]
pub struct RoutingTable {
    entries: HashMap<Address, RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn lookup(&self, dest: &Address) -> Option<&RouteEntry> {
        self.entries.get(dest)
    }

    pub fn lookup_mut(&mut self, dest: &Address) -> Option<&mut RouteEntry> {
        self.entries.get_mut(dest)
    }

    /// Only returns entries that are Valid and unexpired.
    pub fn lookup_valid(&self, dest: &Address, now: u64) -> Option<&RouteEntry> {
        self.entries.get(dest).filter(|e| e.is_valid(now))
    }

    pub fn insert(&mut self, entry: RouteEntry) {
        self.entries.insert(entry.destination, entry);
    }

    pub fn delete(&mut self, dest: &Address) -> Option<RouteEntry> {
        self.entries.remove(dest)
    }

    pub fn contains(&self, dest: &Address) -> bool {
        self.entries.contains_key(dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any usable route exists at all.
    pub fn any_valid(&self, now: u64) -> bool {
        self.entries.values().any(|e| e.is_valid(now))
    }

    /// Apply a candidate route under the replace policy.
    ///
    /// Creates the entry when the destination is unknown. Returns whether the
    /// table changed. Precursors survive a replacement; everything else
    /// comes from the candidate.
    pub fn apply_candidate(&mut self, dest: Address, candidate: &RouteCandidate, now: u64) -> bool {
        match self.entries.get_mut(&dest) {
            None => {
                let mut entry = RouteEntry::in_search(dest, 0, candidate.expires);
                Self::install(&mut entry, candidate);
                self.entries.insert(dest, entry);
                true
            }
            Some(existing) => {
                if should_replace(existing, candidate, now) {
                    Self::install(existing, candidate);
                    true
                } else {
                    // A rejected candidate still refreshes a live route's
                    // lifetime when it names the same next hop.
                    if existing.is_valid(now) && existing.next_hop == Some(candidate.next_hop) {
                        existing.refresh(candidate.expires);
                    }
                    false
                }
            }
        }
    }

    fn install(entry: &mut RouteEntry, candidate: &RouteCandidate) {
        entry.next_hop = Some(candidate.next_hop);
        entry.interface = Some(candidate.interface);
        entry.hop_count = candidate.hop_count;
        if candidate.seq_known {
            entry.seq = candidate.seq;
        }
        entry.seq_known = entry.seq_known || candidate.seq_known;
        entry.state = RouteState::Valid;
        entry.expires = entry.expires.max(candidate.expires);
        entry.ttl = 0;
        entry.retries = 0;
    }

    /// Extend a destination's lifetime if present and valid.
    pub fn refresh(&mut self, dest: &Address, until: u64, now: u64) {
        if let Some(entry) = self.entries.get_mut(dest) {
            if entry.is_valid(now) {
                entry.refresh(until);
            }
        }
    }

    pub fn add_precursor(&mut self, dest: &Address, precursor: Address) {
        if let Some(entry) = self.entries.get_mut(dest) {
            entry.precursors.insert(precursor);
        }
    }

    /// Sweep: expired Valid entries become Invalid (next hop cleared, kept
    /// for their sequence number); Invalid entries past the deletion deadline
    /// are removed. In-search entries are left to the discovery timers.
    pub fn purge(&mut self, now: u64, delete_period: u64) -> PurgeOutcome {
        let mut outcome = PurgeOutcome::default();
        for entry in self.entries.values_mut() {
            if entry.state == RouteState::Valid && now > entry.expires {
                entry.state = RouteState::Invalid;
                entry.next_hop = None;
                entry.precursors.clear();
                entry.expires = now + delete_period;
                outcome.invalidated.push(entry.destination);
            }
        }
        let deleted: Vec<Address> = self
            .entries
            .values()
            .filter(|e| e.state == RouteState::Invalid && now > e.expires)
            .map(|e| e.destination)
            .collect();
        for dest in &deleted {
            self.entries.remove(dest);
        }
        outcome.deleted = deleted;
        outcome
    }

    /// Destinations currently routed through the given next hop, with their
    /// last known sequence numbers. Used to scope error propagation.
    pub fn destinations_via(&self, next_hop: &Address) -> Vec<(Address, SeqNum)> {
        self.entries
            .values()
            .filter(|e| e.state == RouteState::Valid && e.next_hop == Some(*next_hop))
            .map(|e| (e.destination, e.seq))
            .collect()
    }

    /// Mark a batch of destinations Invalid with an updated sequence number
    /// and a deletion deadline. Returns the union of their precursors.
    pub fn invalidate_set(
        &mut self,
        dests: &[(Address, SeqNum)],
        delete_at: u64,
    ) -> BTreeSet<Address> {
        let mut precursors = BTreeSet::new();
        for (dest, seq) in dests {
            if let Some(entry) = self.entries.get_mut(dest) {
                entry.state = RouteState::Invalid;
                entry.next_hop = None;
                entry.seq = *seq;
                entry.seq_known = true;
                entry.expires = delete_at;
                precursors.append(&mut std::mem::take(&mut entry.precursors));
            }
        }
        precursors
    }

    /// Drop every route learned on a torn-down interface.
    pub fn remove_interface(&mut self, iface: InterfaceId) -> Vec<Address> {
        let removed: Vec<Address> = self
            .entries
            .values()
            .filter(|e| e.interface == Some(iface))
            .map(|e| e.destination)
            .collect();
        for dest in &removed {
            self.entries.remove(dest);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}
