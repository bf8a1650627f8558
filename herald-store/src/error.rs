//! Error types for the herald-store crate.

use herald_common::{CampaignId, EventError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No campaign with this id.
    #[error("Campaign not found: {0}")]
    NotFound(CampaignId),

    /// A campaign with this id was already inserted.
    #[error("Campaign already exists: {0}")]
    AlreadyExists(CampaignId),

    /// The store refuses to hold more campaigns.
    #[error("Campaign store capacity exceeded: {len}/{capacity} campaigns")]
    CapacityExceeded { len: usize, capacity: usize },

    /// The event is not valid for the campaign's current state.
    #[error("Rejected event for campaign {id}: {source}")]
    Event {
        id: CampaignId,
        #[source]
        source: EventError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use herald_common::CampaignStatus;

    use super::*;

    #[test]
    fn test_event_error_keeps_source() {
        let err = StoreError::Event {
            id: CampaignId::generate(),
            source: EventError::InvalidTransition {
                from: CampaignStatus::Completed,
                to: CampaignStatus::Failed,
            },
        };

        assert!(err.source().is_some());
        assert!(err.to_string().contains("completed to failed"));
    }
}
