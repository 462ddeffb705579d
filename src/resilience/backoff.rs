//! Fixed-interval reconnect backoff.
//!
//! The channel is retried indefinitely at a constant interval: no jitter, no
//! cap on the number of attempts. The first attempt of a cycle is not delayed;
//! the caller only consults the backoff after a failure.

use std::time::{Duration, Instant};

/// Constant delay between consecutive connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    interval: Duration,
}

impl FixedBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay after a failed attempt. The same for every attempt.
    pub fn delay(&self) -> Duration {
        self.interval
    }

    /// Instant at which the attempt following a failure at `now` may run.
    pub fn next_attempt(&self, now: Instant) -> Instant {
        now + self.interval
    }
}
