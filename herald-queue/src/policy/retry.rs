//! When a failed job gets another go, and how long it waits first.

use std::time::Duration;

/// Exponential backoff without jitter: the wait before retry `n` is
/// `base * 2^(n - 1)`.
///
/// No distinction is made between kinds of failure. A missing API key is
/// retried exactly like a network blip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Whether a job that has made `attempts` attempts may be tried again.
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// How long to wait after the `attempts`-th failed attempt.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let delay = if exponent >= 63 {
            u64::MAX
        } else {
            self.base_delay_ms.saturating_mul(1u64 << exponent)
        };

        Duration::from_millis(delay)
    }

    pub const fn remaining_attempts(&self, attempts: u32) -> u32 {
        self.max_retries.saturating_sub(attempts)
    }
}
