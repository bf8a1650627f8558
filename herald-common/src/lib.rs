//! Shared types for the herald campaign dispatch engine
//!
//! Everything that more than one herald crate needs to agree on lives here:
//! the campaign data model, the lifecycle events that drive it, the email
//! syntax check and the logging setup.

pub mod address;
pub mod campaign;
pub mod error;
pub mod event;
pub mod id;
pub mod logging;

pub use tracing;

pub use campaign::{
    Campaign, CampaignRequest, CampaignStats, CampaignStatus, Engagement, MAX_TRACKED_LINKS,
    Recipient, SendOptions, SendOptionsRequest, SendOutcome, SendResult, SenderInfo, Template,
};
pub use error::{EventError, ValidationError};
pub use event::{CampaignEvent, RecordedEvent};
pub use id::CampaignId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
