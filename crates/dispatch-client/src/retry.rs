//! Retry logic with exponential backoff.

use std::time::Duration;

/// Attempts made for one task before the submission is reported exhausted.
pub const MAX_RETRIES: u32 = 3;

/// Retry policy for task submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Length of one backoff time unit
    pub unit: Duration,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max_attempts: MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Policy with the standard attempt count and the given time unit.
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-indexed): `unit * 2^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(20)); // Prevent overflow
        self.unit.saturating_mul(multiplier)
    }

    /// Whether another attempt follows a failure at `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
