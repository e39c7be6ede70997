//! Exponential reconnect backoff with jitter.

use std::time::Duration;

/// Reconnect schedule used after the log subscription drops.
///
/// Delays double from `initial_delay` up to `max_delay`, each with ±12.5%
/// jitter so that many exporters restarted together do not reconnect in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    /// Default schedule: 1s initial delay, 60s cap.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self::with_settings(max_attempts, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Custom schedule.
    #[must_use]
    pub const fn with_settings(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Attempts allowed before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Un-jittered delay before attempt `attempt` (1-based).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    /// Delay before attempt `attempt` with jitter applied.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_factor = 0.25 * (rand::random::<f64>() - 0.5);
        base.mul_f64(1.0 + jitter_factor)
    }
}
