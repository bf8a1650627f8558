//! Typed error handling for dispatch operations.
//!
//! Per-recipient transport failures are split into:
//! - Temporary failures - retried with backoff, up to the retry policy's limit
//! - Permanent failures - settled as failed immediately
//!
//! Everything else that can go wrong while accepting or running a campaign is
//! a [`DispatchError`].

use herald_common::{EventError, ValidationError};
use herald_store::StoreError;
use thiserror::Error;

/// A single send that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport may accept the message if asked again (e.g. 4xx SMTP codes,
    /// connection failures).
    #[error("Temporary failure: {0}")]
    Temporary(String),

    /// The transport will never accept this message (e.g. 5xx SMTP codes,
    /// malformed addresses).
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Returns `true` if this error is temporary and the send may be retried.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Returns `true` if this error is permanent and should not be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Errors raised while accepting or running a campaign.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The submission was rejected before any work started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The campaign store refused or failed an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The transport could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The process is shutting down and no further batches will be sent.
    #[error("dispatch interrupted by shutdown")]
    Shutdown,

    /// Other internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Returns `true` if the caller is at fault (a 400-class error).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the campaign being looked up does not exist, or
    /// has no such recipient.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(
                StoreError::NotFound(_)
                    | StoreError::Event {
                        source: EventError::UnknownRecipient(_),
                        ..
                    }
            )
        )
    }

    /// The malformed recipient addresses, if that is why the submission failed.
    #[must_use]
    pub fn invalid_emails(&self) -> Option<&[String]> {
        match self {
            Self::Validation(error) => error.invalid_emails(),
            _ => None,
        }
    }
}
