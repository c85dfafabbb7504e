//! Duplicate suppression for flooded control and data traffic.
//!
//! Entries age out lazily: `check_and_record` ignores expired entries and a
//! periodic `cull` keeps the maps from growing without bound.

use std::collections::HashMap;

use aodv_core::types::{Address, RequestId};

/// Remembers recently seen (originator, request id) pairs so a flooded
/// request is processed once per node per discovery window.
#[must_use]
pub struct SeenRequests {
    seen: HashMap<(Address, RequestId), u64>,
    window: u64,
}

impl SeenRequests {
    pub fn new(window: u64) -> Self {
        Self {
            seen: HashMap::new(),
            window,
        }
    }

    /// True when the pair was already seen inside the window. Records the
    /// sighting either way, restarting the window.
    pub fn check_and_record(&mut self, originator: Address, id: RequestId, now: u64) -> bool {
        let duplicate = self
            .seen
            .get(&(originator, id))
            .is_some_and(|&at| now.saturating_sub(at) <= self.window);
        self.seen.insert((originator, id), now);
        duplicate
    }

    pub fn cull(&mut self, now: u64) {
        let window = self.window;
        self.seen.retain(|_, &mut at| now.saturating_sub(at) <= window);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Remembers recently seen (source, packet id) pairs for broadcast data so
/// re-broadcast storms terminate.
#[must_use]
pub struct SeenBroadcasts {
    seen: HashMap<(Address, u16), u64>,
    window: u64,
}

impl SeenBroadcasts {
    pub fn new(window: u64) -> Self {
        Self {
            seen: HashMap::new(),
            window,
        }
    }

    pub fn check_and_record(&mut self, source: Address, id: u16, now: u64) -> bool {
        let duplicate = self
            .seen
            .get(&(source, id))
            .is_some_and(|&at| now.saturating_sub(at) <= self.window);
        self.seen.insert((source, id), now);
        duplicate
    }

    pub fn cull(&mut self, now: u64) {
        let window = self.window;
        self.seen.retain(|_, &mut at| now.saturating_sub(at) <= window);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
