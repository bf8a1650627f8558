//! Campaign intake validation.
//!
//! Checks run in a fixed order and the first failing check rejects the whole
//! submission. Recipient addresses are checked together so the caller learns
//! every offending address at once.

use chrono::{DateTime, Utc};
use herald_common::{
    Campaign, CampaignId, CampaignRequest, CampaignStats, CampaignStatus, Engagement,
    SendOptions, ValidationError, address::is_valid_email,
};

use crate::DispatchConfig;

pub struct Validator<'a> {
    config: &'a DispatchConfig,
}

impl<'a> Validator<'a> {
    pub const fn new(config: &'a DispatchConfig) -> Self {
        Self { config }
    }

    /// Turn a raw submission into a campaign in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in this order: empty or
    /// oversized recipient list, blank subject or body, malformed sender or
    /// reply-to address, malformed recipient addresses, send options outside
    /// the configured limits.
    pub fn validate(
        &self,
        request: CampaignRequest,
        now: DateTime<Utc>,
    ) -> Result<Campaign, ValidationError> {
        if request.recipients.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        if request.recipients.len() > self.config.max_recipients {
            return Err(ValidationError::TooManyRecipients {
                count: request.recipients.len(),
                max: self.config.max_recipients,
            });
        }

        if request.template.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("template.subject"));
        }
        if request.template.body.trim().is_empty() {
            return Err(ValidationError::MissingField("template.body"));
        }

        if request.sender_info.email.trim().is_empty() {
            return Err(ValidationError::MissingField("senderInfo.email"));
        }
        if !is_valid_email(&request.sender_info.email) {
            return Err(ValidationError::InvalidSenderEmail(
                request.sender_info.email,
            ));
        }
        if let Some(reply_to) = &request.sender_info.reply_to {
            if !is_valid_email(reply_to) {
                return Err(ValidationError::InvalidReplyTo(reply_to.clone()));
            }
        }

        let invalid: Vec<String> = request
            .recipients
            .iter()
            .filter(|recipient| !is_valid_email(&recipient.email))
            .map(|recipient| recipient.email.clone())
            .collect();
        if !invalid.is_empty() {
            return Err(ValidationError::InvalidRecipients(invalid));
        }

        let send_options = self.send_options(request.send_options.unwrap_or_default())?;

        let name = request
            .campaign_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(
                || format!("Campaign {}", now.format("%Y-%m-%d %H:%M")),
                ToString::to_string,
            );

        Ok(Campaign {
            id: CampaignId::generate(),
            name,
            stats: CampaignStats {
                total_recipients: request.recipients.len() as u64,
                ..CampaignStats::default()
            },
            template: request.template,
            sender_info: request.sender_info,
            recipients: request.recipients,
            send_options,
            scheduled_time: request.scheduled_time,
            status: CampaignStatus::Created,
            created_at: now,
            started_at: None,
            finished_at: None,
            error: None,
            engagement: Engagement::default(),
        })
    }

    fn send_options(
        &self,
        requested: herald_common::SendOptionsRequest,
    ) -> Result<SendOptions, ValidationError> {
        let batch_size = requested
            .batch_size
            .unwrap_or(self.config.default_batch_size);
        if batch_size == 0 || batch_size > self.config.max_batch_size {
            return Err(ValidationError::InvalidSendOption {
                field: "batchSize",
                reason: format!("must be between 1 and {}", self.config.max_batch_size),
            });
        }

        let delay_ms = requested.delay_ms.unwrap_or(self.config.default_delay_ms);
        if delay_ms < self.config.min_delay_ms {
            return Err(ValidationError::InvalidSendOption {
                field: "delayMs",
                reason: format!("must be at least {}", self.config.min_delay_ms),
            });
        }

        Ok(SendOptions {
            delay_ms,
            batch_size,
            track_opens: requested.track_opens.unwrap_or(true),
            track_clicks: requested.track_clicks.unwrap_or(true),
        })
    }
}
