//! Error types shared by the herald crates.

use thiserror::Error;

use crate::CampaignStatus;

/// Reasons a campaign submission is rejected before any work starts.
///
/// Validation is all-or-nothing: a submission that produces one of these
/// never reaches the batch scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The recipient list is empty.
    #[error("Recipients list is required and must not be empty")]
    NoRecipients,

    /// More recipients than a single campaign may target.
    #[error("Too many recipients: {count} (maximum {max})")]
    TooManyRecipients { count: usize, max: usize },

    /// A required field is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The sender address is not a syntactically valid email.
    #[error("Invalid sender email: {0}")]
    InvalidSenderEmail(String),

    /// The reply-to address is not a syntactically valid email.
    #[error("Invalid reply-to email: {0}")]
    InvalidReplyTo(String),

    /// One or more recipient addresses are malformed. Carries every offender.
    #[error("Invalid recipient emails: {}", .0.join(", "))]
    InvalidRecipients(Vec<String>),

    /// A send option is outside the advertised limits.
    #[error("Invalid send option {field}: {reason}")]
    InvalidSendOption { field: &'static str, reason: String },
}

impl ValidationError {
    /// The malformed recipient addresses, if that is why validation failed.
    #[must_use]
    pub fn invalid_emails(&self) -> Option<&[String]> {
        match self {
            Self::InvalidRecipients(emails) => Some(emails),
            _ => None,
        }
    }
}

/// Errors raised when applying a lifecycle event to a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event would move the campaign along an edge the state machine lacks.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// A send outcome arrived after every recipient had already settled.
    #[error("Send outcome exceeds total recipients ({total})")]
    CountOverflow { total: u64 },

    /// Completion was recorded before every recipient settled.
    #[error("Campaign cannot complete with {settled} of {total} recipients settled")]
    Incomplete { settled: u64, total: u64 },

    /// A send outcome arrived for a campaign that already finished.
    #[error("Campaign already finished with status {0}")]
    Finished(CampaignStatus),

    /// Engagement reported for an address the campaign never targeted.
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    /// The open or click was already counted, or the recipient hit the link cap.
    #[error("Engagement already recorded")]
    AlreadyRecorded,
}
