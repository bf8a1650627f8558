//! Campaign lifecycle events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SendOutcome, SendResult};

/// Something that happened to a campaign.
///
/// Events are recorded in order; applying them in that order to the campaign
/// created at intake reproduces its current status and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CampaignEvent {
    /// Dispatch deferred until `scheduled_for`.
    Scheduled { scheduled_for: DateTime<Utc> },
    /// The batch scheduler picked the campaign up.
    Started {
        name: String,
        total_recipients: u64,
        total_batches: u64,
    },
    Sent {
        recipient: String,
        message_id: String,
        attempts: u32,
    },
    SendFailed {
        recipient: String,
        error: String,
        attempts: u32,
    },
    /// Snapshot taken after every batch settles.
    Progress {
        sent: u64,
        failed: u64,
        current_batch: u64,
        total_batches: u64,
    },
    Completed { sent: u64, failed: u64 },
    Failed { error: String },
    Opened { recipient: String },
    Clicked { recipient: String, url: String },
}

impl CampaignEvent {
    /// Short machine-friendly name, used as a log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scheduled { .. } => "scheduled",
            Self::Started { .. } => "started",
            Self::Sent { .. } => "sent",
            Self::SendFailed { .. } => "send_failed",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Opened { .. } => "opened",
            Self::Clicked { .. } => "clicked",
        }
    }
}

impl From<SendResult> for CampaignEvent {
    fn from(result: SendResult) -> Self {
        match result.outcome {
            SendOutcome::Sent { message_id } => Self::Sent {
                recipient: result.recipient_email,
                message_id,
                attempts: result.attempts,
            },
            SendOutcome::Failed { error } => Self::SendFailed {
                recipient: result.recipient_email,
                error,
                attempts: result.attempts,
            },
        }
    }
}

/// An event as stored, with its position in the campaign's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: CampaignEvent,
}
