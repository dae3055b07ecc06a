//! Bounded retry policy with exponential backoff.

use std::time::Duration;

use rand::Rng;

/// How many times to call an unreliable collaborator and how long to wait
/// between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        calculate_backoff(attempt, base_ms, max_ms, self.jitter)
    }
}

/// `base_ms * 2^(attempt - 1)`, capped at `max_ms`. Attempt 0 has no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let extra = if jitter && delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(extra).min(max_ms))
}
