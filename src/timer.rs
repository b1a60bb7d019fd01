use std::time::{Duration, Instant};

/// A repeating deadline. Dropping the value cancels it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatingTask {
    interval: Duration,
    next_due: Instant,
}

impl RepeatingTask {
    pub fn start(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// Consumes one firing if it is due, re-arming for the following one.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.interval;
        true
    }

    /// Time left before the next firing, zero when overdue.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
