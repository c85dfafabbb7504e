//! Keyed deadline tracking.
//!
//! Timers are a map from key to absolute deadline. Scheduling the same key
//! again moves its deadline, cancelling a missing key is a no-op, and a
//! fired timer's handler re-checks state before acting, so stale wakeups
//! are harmless.

use std::collections::HashMap;

use aodv_core::types::Address;

/// What a deadline means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Ring search for this destination timed out without a reply.
    DiscoveryRetry(Address),
    /// An acknowledgment-demanding reply sent toward this next hop has not
    /// been acknowledged.
    AckWait(Address),
    /// Time to emit a keep-alive.
    HelloEmit,
    /// Per-second control message budget resets.
    RateLimitReset,
    /// Periodic sweep of routes, neighbors, and dedup caches.
    Sweep,
}

#[must_use]
pub struct TimerQueue {
    deadlines: HashMap<TimerKey, u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }

    /// Set or move a deadline.
    pub fn schedule(&mut self, key: TimerKey, at: u64) {
        self.deadlines.insert(key, at);
    }

    pub fn cancel(&mut self, key: &TimerKey) {
        self.deadlines.remove(key);
    }

    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.deadlines.contains_key(key)
    }

    /// The pending deadline for a key, if one is scheduled.
    pub fn deadline_of(&self, key: &TimerKey) -> Option<u64> {
        self.deadlines.get(key).copied()
    }

    /// Remove and return every key whose deadline has passed, earliest
    /// first.
    pub fn due(&mut self, now: u64) -> Vec<TimerKey> {
        let mut fired: Vec<(TimerKey, u64)> = self
            .deadlines
            .iter()
            .filter(|(_, &at)| at <= now)
            .map(|(k, &at)| (*k, at))
            .collect();
        fired.sort_by_key(|&(_, at)| at);
        for (key, _) in &fired {
            self.deadlines.remove(key);
        }
        fired.into_iter().map(|(k, _)| k).collect()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().copied().min()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
