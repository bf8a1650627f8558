use herald_common::ValidationError;
use serde::Deserialize;

use crate::RetryPolicy;

const fn default_max_recipients() -> usize {
    1000
}

const fn default_max_batch_size() -> usize {
    100
}

const fn default_min_delay_ms() -> u64 {
    100
}

const fn default_batch_size() -> usize {
    50
}

const fn default_delay_ms() -> u64 {
    1000
}

const fn default_per_recipient_estimate_ms() -> u64 {
    100
}

fn default_fallback_name() -> String {
    "Dear Customer".to_string()
}

fn default_tracking_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Limits and defaults applied to every campaign
///
/// # Examples
///
/// ```ron
/// Herald (
///     dispatch: (
///         max_recipients: 1000,
///         default_batch_size: 50,
///         default_delay_ms: 1000,
///         tracking_base_url: "https://mail.example.com",
///         retry: (
///             max_attempts: 3,
///         ),
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DispatchConfig {
    /// Largest recipient list a single campaign may target
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,

    /// Upper bound for a campaign's `batchSize`
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Lower bound for a campaign's `delayMs`
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// `batchSize` used when a submission leaves it out
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// `delayMs` used when a submission leaves it out
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Assumed transport time per recipient, used only for the published estimate
    #[serde(default = "default_per_recipient_estimate_ms")]
    pub per_recipient_estimate_ms: u64,

    /// Substituted for `{{name}}` when a recipient has no name
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,

    /// Public base URL of the tracking endpoints, without a trailing slash
    #[serde(default = "default_tracking_base_url")]
    pub tracking_base_url: String,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_recipients: default_max_recipients(),
            max_batch_size: default_max_batch_size(),
            min_delay_ms: default_min_delay_ms(),
            default_batch_size: default_batch_size(),
            default_delay_ms: default_delay_ms(),
            per_recipient_estimate_ms: default_per_recipient_estimate_ms(),
            fallback_name: default_fallback_name(),
            tracking_base_url: default_tracking_base_url(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchConfig {
    /// Make sure the defaults fall inside the limits they are checked against.
    ///
    /// # Errors
    /// Returns the first default that a submission relying on it would fail
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.default_batch_size == 0 || self.default_batch_size > self.max_batch_size {
            return Err(ValidationError::InvalidSendOption {
                field: "default_batch_size",
                reason: format!("must be between 1 and {}", self.max_batch_size),
            });
        }
        if self.default_delay_ms < self.min_delay_ms {
            return Err(ValidationError::InvalidSendOption {
                field: "default_delay_ms",
                reason: format!("must be at least {}ms", self.min_delay_ms),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ValidationError::InvalidSendOption {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ValidationError::InvalidSendOption {
                field: "retry.jitter_factor",
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if !(self.tracking_base_url.starts_with("http://")
            || self.tracking_base_url.starts_with("https://"))
        {
            return Err(ValidationError::InvalidSendOption {
                field: "tracking_base_url",
                reason: "must be an http or https URL".to_string(),
            });
        }

        Ok(())
    }
}
