//! Retry policy for channel sends.
//!
//! Encapsulates how many times a transient channel failure is retried and
//! how long to wait in between, independent of the dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::calculate_backoff;

/// Retry policy configuration for alarm dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of channel calls per alarm, including the first.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay after attempt `n` is `base * 2^(n - 1)`.
    ///
    /// Default: 200 milliseconds
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff delay (in milliseconds).
    ///
    /// Default: 5000 milliseconds
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor for randomizing backoff delays.
    ///
    /// The delay is randomized within ±`jitter_factor`, never above
    /// `max_delay_ms`.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Policy with jitter disabled, for predictable timing.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Check if another attempt is allowed after `attempt_count` calls.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Delay to wait after the `attempt_count`-th call failed.
    #[must_use]
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        calculate_backoff(
            attempt_count,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
        )
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        200
    }

    pub const fn max_delay_ms() -> u64 {
        5_000
    }

    pub const fn jitter_factor() -> f64 {
        0.1 // ±10%
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 200);
        assert_eq!(policy.max_delay_ms, 5000);
        assert!((policy.jitter_factor - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));

        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(10));
        assert!(!policy.should_retry(u32::MAX));
    }

    #[test]
    fn test_delay_for() {
        let policy = RetryPolicy::default().without_jitter();

        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(8), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_config() {
        let policy: RetryPolicy = ron::from_str("(max_attempts: 5)").expect("policy parses");
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 200);
    }
}
