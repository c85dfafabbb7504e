//! Per-second budgets for originated control traffic.

/// A fixed allowance that refills once per second. Suppressed sends are
/// counted but otherwise dropped silently; route requests will be retried
/// by their own timers and route errors by the next failed delivery.
#[must_use]
pub struct MessageBudget {
    limit: u32,
    used: u32,
    suppressed: u64,
}

impl MessageBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: 0,
            suppressed: 0,
        }
    }

    /// Take one unit from the budget. False means the send must be dropped.
    pub fn try_consume(&mut self) -> bool {
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    /// Total sends dropped over the budget's lifetime.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
