//! The campaign data model
//!
//! A [`Campaign`] is created at intake and afterwards only changes by having
//! [`CampaignEvent`]s applied to it, so its status and counters can always be
//! rebuilt by replaying the recorded events in order.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CampaignEvent, CampaignId, EventError};

/// Subject and body shared by every recipient of a campaign.
///
/// Both may contain `{{key}}` placeholders resolved per recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl Template {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl SenderInfo {
    /// The `From` header value, `Name <email>` when a name is present.
    ///
    /// A name containing anything other than atoms and spaces is written as
    /// an RFC 5322 quoted string.
    #[must_use]
    pub fn mailbox(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            self.email.clone()
        } else if name.chars().all(is_phrase_char) {
            format!("{name} <{}>", self.email)
        } else {
            let mut quoted = String::with_capacity(name.len() + 2);
            quoted.push('"');
            for c in name.chars() {
                if matches!(c, '"' | '\\') {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
            quoted.push('"');
            format!("{quoted} <{}>", self.email)
        }
    }
}

/// `atext` from RFC 5322, plus the spaces separating words of a phrase
const fn is_phrase_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || !c.is_ascii()
        || matches!(
            c,
            ' ' | '!'
                | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '/'
                | '='
                | '?'
                | '^'
                | '_'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

/// A single addressee and the data used to personalise their copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: BTreeMap<String, serde_json::Value>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }
}

/// Send options as submitted; any field left out takes the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptionsRequest {
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub track_opens: Option<bool>,
    #[serde(default)]
    pub track_clicks: Option<bool>,
}

/// Send options after defaults have been filled in and limits checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub delay_ms: u64,
    pub batch_size: usize,
    pub track_opens: bool,
    pub track_clicks: bool,
}

/// A raw campaign submission, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub template: Template,
    #[serde(default)]
    pub sender_info: SenderInfo,
    #[serde(default)]
    pub send_options: Option<SendOptionsRequest>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Created,
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Returns `true` once the campaign can no longer change status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the lifecycle state machine has an edge from `self` to `next`.
    ///
    /// `Created → {Scheduled | Processing}`, `Scheduled → Processing`,
    /// `Processing → {Completed | Failed}`. A campaign may also fail before it
    /// starts processing, when dispatch setup itself breaks.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Scheduled | Self::Processing | Self::Failed)
                | (Self::Scheduled, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Scheduled => "scheduled",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub sent_count: u64,
    pub failed_count: u64,
    pub total_recipients: u64,
    pub current_batch: u64,
    pub total_batches: u64,
    pub opens: u64,
    pub clicks: u64,
}

impl CampaignStats {
    /// Recipients that have reached a terminal outcome.
    #[must_use]
    pub const fn settled(&self) -> u64 {
        self.sent_count + self.failed_count
    }

    /// Recipients still waiting for an outcome.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total_recipients.saturating_sub(self.settled())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SendOutcome {
    Sent { message_id: String },
    Failed { error: String },
}

/// The terminal outcome of sending to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub recipient_email: String,
    #[serde(flatten)]
    pub outcome: SendOutcome,
    /// Transport calls made, including retries
    pub attempts: u32,
}

impl SendResult {
    pub fn sent(recipient: impl Into<String>, message_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            recipient_email: recipient.into(),
            outcome: SendOutcome::Sent {
                message_id: message_id.into(),
            },
            attempts,
        }
    }

    pub fn failed(recipient: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            recipient_email: recipient.into(),
            outcome: SendOutcome::Failed {
                error: error.into(),
            },
            attempts,
        }
    }

    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self.outcome, SendOutcome::Sent { .. })
    }
}

/// Upper bound on distinct links counted as clicked for one recipient.
pub const MAX_TRACKED_LINKS: usize = 32;

/// Engagement already counted, so repeats are not counted twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Engagement {
    opened: BTreeSet<String>,
    clicked: BTreeMap<String, BTreeSet<String>>,
}

impl Engagement {
    #[must_use]
    pub fn has_opened(&self, recipient: &str) -> bool {
        self.opened.contains(recipient)
    }

    #[must_use]
    pub fn has_clicked(&self, recipient: &str, url: &str) -> bool {
        self.clicked
            .get(recipient)
            .is_some_and(|urls| urls.contains(url))
    }
}

/// One bulk-send operation targeting a recipient set with one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub template: Template,
    pub sender_info: SenderInfo,
    pub recipients: Vec<Recipient>,
    pub send_options: SendOptions,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub stats: CampaignStats,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(skip)]
    pub engagement: Engagement,
}

impl Campaign {
    /// Number of batches the recipients split into at the configured batch size.
    #[must_use]
    pub const fn batch_count(&self) -> usize {
        self.recipients.len().div_ceil(self.send_options.batch_size)
    }

    /// Apply a lifecycle event recorded at `at`.
    ///
    /// # Errors
    ///
    /// Fails without modifying the campaign if the event is not valid in the
    /// current state: an illegal status transition, a send outcome beyond the
    /// recipient total or after completion, or completion before every
    /// recipient has settled. Opens and clicks must name a recipient of the
    /// campaign, and are rejected with [`EventError::AlreadyRecorded`] once
    /// counted.
    pub fn apply(&mut self, event: &CampaignEvent, at: DateTime<Utc>) -> Result<(), EventError> {
        match event {
            CampaignEvent::Scheduled { .. } => self.transition(CampaignStatus::Scheduled)?,
            CampaignEvent::Started { total_batches, .. } => {
                self.transition(CampaignStatus::Processing)?;
                self.stats.total_batches = *total_batches;
                self.started_at = Some(at);
            }
            CampaignEvent::Sent { .. } => {
                self.check_outcome_allowed()?;
                self.stats.sent_count += 1;
            }
            CampaignEvent::SendFailed { .. } => {
                self.check_outcome_allowed()?;
                self.stats.failed_count += 1;
            }
            CampaignEvent::Progress {
                current_batch,
                total_batches,
                ..
            } => {
                self.stats.current_batch = *current_batch;
                self.stats.total_batches = *total_batches;
            }
            CampaignEvent::Completed { .. } => {
                if self.stats.remaining() > 0 {
                    return Err(EventError::Incomplete {
                        settled: self.stats.settled(),
                        total: self.stats.total_recipients,
                    });
                }
                self.transition(CampaignStatus::Completed)?;
                self.finished_at = Some(at);
            }
            CampaignEvent::Failed { error } => {
                self.transition(CampaignStatus::Failed)?;
                self.error = Some(error.clone());
                self.finished_at = Some(at);
            }
            CampaignEvent::Opened { recipient } => {
                self.check_recipient(recipient)?;
                if !self.engagement.opened.insert(recipient.clone()) {
                    return Err(EventError::AlreadyRecorded);
                }
                self.stats.opens += 1;
            }
            CampaignEvent::Clicked { recipient, url } => {
                self.check_recipient(recipient)?;
                let urls = self.engagement.clicked.entry(recipient.clone()).or_default();
                if urls.len() >= MAX_TRACKED_LINKS || urls.contains(url) {
                    return Err(EventError::AlreadyRecorded);
                }
                urls.insert(url.clone());
                self.stats.clicks += 1;
            }
        }

        Ok(())
    }

    fn transition(&mut self, next: CampaignStatus) -> Result<(), EventError> {
        if !self.status.can_transition_to(next) {
            return Err(EventError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn check_recipient(&self, email: &str) -> Result<(), EventError> {
        if self.recipients.iter().any(|r| r.email == email) {
            Ok(())
        } else {
            Err(EventError::UnknownRecipient(email.to_string()))
        }
    }

    const fn check_outcome_allowed(&self) -> Result<(), EventError> {
        if self.status.is_terminal() {
            return Err(EventError::Finished(self.status));
        }
        if self.stats.remaining() == 0 {
            return Err(EventError::CountOverflow {
                total: self.stats.total_recipients,
            });
        }
        Ok(())
    }
}
