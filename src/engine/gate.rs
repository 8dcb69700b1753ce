//! Elapsed-time gating for the medium and slow tiers.
//!
//! The scheduler takes one monotonic clock reading per loop iteration and
//! evaluates every gate against it; there are no per-tier timers. A gate
//! that has never run is due immediately, and marking is the caller's
//! responsibility so that a due iteration is marked regardless of whether
//! the inner fetches succeed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct TierGate {
    period: Duration,
    last_run: Option<Instant>,
}

impl TierGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_run: None,
        }
    }

    /// Whether at least one period has elapsed since the last marked run.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.period,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_run = Some(now);
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
