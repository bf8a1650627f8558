//! Per-recipient retry policy.
//!
//! A send that fails with a temporary transport error is retried inside the
//! recipient's own task, so the batch still settles only once every recipient
//! has a terminal outcome.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy configuration for individual sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total transport calls per recipient, including the first.
    ///
    /// `1` disables retry.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay before attempt `k + 1` is `base * 2^(k - 1)`.
    ///
    /// Default: 250ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay between attempts (in milliseconds).
    ///
    /// Default: 5000ms
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor for randomizing retry delays.
    ///
    /// The delay is randomized within ±`jitter_factor`.
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
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check if another attempt is allowed after `attempts` have been made.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// How long to wait after attempt number `attempt` (1-indexed) failed.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        backoff_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
        )
    }
}

/// Exponential backoff with jitter
///
/// # Formula
/// `delay = min(base * 2^(attempt - 1), max_delay) * (1 ± jitter)`
///
/// A jitter factor that is not a finite positive number disables jitter, and
/// anything above `1.0` is treated as `1.0`.
pub fn backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_factor: f64) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        max_delay_ms
    } else {
        base_delay_ms.saturating_mul(1u64 << exponent).min(max_delay_ms)
    };

    if !jitter_factor.is_finite() || jitter_factor <= 0.0 || delay == 0 {
        return Duration::from_millis(delay);
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered = {
        let range = (delay as f64) * jitter_factor.min(1.0);
        let jitter: f64 = rand::rng().random_range(-range..=range);
        ((delay as f64) + jitter).max(0.0) as u64
    };

    Duration::from_millis(jittered)
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        250
    }

    pub const fn max_delay_ms() -> u64 {
        5000
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 250);
        assert_eq!(policy.max_delay_ms, 5000);
        assert!((policy.jitter_factor - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        assert!(!RetryPolicy::disabled().should_retry(1));
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        assert_eq!(backoff_delay(1, 250, 5000, 0.0), Duration::from_millis(250));
        assert_eq!(backoff_delay(2, 250, 5000, 0.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(3, 250, 5000, 0.0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(10, 250, 5000, 0.0), Duration::from_millis(5000));
        assert_eq!(backoff_delay(200, 250, 5000, 0.0), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        for _ in 0..100 {
            let delay = backoff_delay(2, 250, 5000, 0.2).as_millis();
            assert!((400..=600).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_backoff_ignores_unusable_jitter() {
        assert_eq!(backoff_delay(1, 250, 5000, f64::NAN), Duration::from_millis(250));
        assert_eq!(
            backoff_delay(1, 250, 5000, f64::INFINITY),
            Duration::from_millis(250)
        );
        for _ in 0..100 {
            let delay = backoff_delay(1, 250, 5000, 1e300).as_millis();
            assert!(delay <= 500, "delay {delay} out of range");
        }
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = ron::from_str("(max_attempts: 5)").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 250);
    }
}
