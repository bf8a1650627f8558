use std::sync::Arc;

use herald_common::{
    Campaign, CampaignEvent, CampaignId, Recipient, SendResult, internal, tracing,
};
use herald_store::{CampaignStore, StoreError};

/// Records a running campaign's lifecycle in the store.
///
/// Owned by the single task driving the campaign, so the running counters
/// need no synchronisation: concurrent sends report back to that task, which
/// records each outcome in turn.
#[derive(Debug)]
pub struct ProgressAggregator {
    store: Arc<dyn CampaignStore>,
    campaign: Arc<Campaign>,
    sent: u64,
    failed: u64,
    batches_settled: usize,
    /// Recipients handed to the sender so far, in list order
    dispatched: usize,
    /// Outcomes the store failed to record, retried when the campaign fails
    unrecorded: Vec<SendResult>,
}

impl ProgressAggregator {
    pub fn new(store: Arc<dyn CampaignStore>, campaign: Arc<Campaign>) -> Self {
        Self {
            store,
            campaign,
            sent: 0,
            failed: 0,
            batches_settled: 0,
            dispatched: 0,
            unrecorded: Vec::new(),
        }
    }

    fn id(&self) -> &CampaignId {
        &self.campaign.id
    }

    #[must_use]
    pub fn total_batches(&self) -> usize {
        self.campaign.batch_count()
    }

    /// Record the move to `Processing`.
    ///
    /// # Errors
    /// Returns an error if the store rejects the event
    pub async fn start(&self) -> Result<(), StoreError> {
        self.store
            .record(
                self.id(),
                CampaignEvent::Started {
                    name: self.campaign.name.clone(),
                    total_recipients: self.campaign.stats.total_recipients,
                    total_batches: self.total_batches() as u64,
                },
            )
            .await?;

        internal!(
            level = INFO,
            campaign_id = %self.id(),
            name = %self.campaign.name,
            recipients = self.campaign.stats.total_recipients,
            batches = self.total_batches(),
            "Campaign started"
        );

        Ok(())
    }

    /// Note that the next `size` recipients are being sent.
    pub fn begin_batch(&mut self, size: usize) {
        self.dispatched = (self.dispatched + size).min(self.campaign.recipients.len());
    }

    /// Record one recipient's terminal outcome.
    ///
    /// # Errors
    /// Returns an error if the store fails to record it. The outcome is kept
    /// and recorded again by [`Self::fail`].
    pub async fn record(&mut self, result: SendResult) -> Result<(), StoreError> {
        let is_sent = result.is_sent();
        if let Err(error) = self
            .store
            .record(self.id(), CampaignEvent::from(result.clone()))
            .await
        {
            self.unrecorded.push(result);
            return Err(error);
        }

        if is_sent {
            self.sent += 1;
        } else {
            self.failed += 1;
            tracing::warn!(
                campaign_id = %self.id(),
                recipient = %result.recipient_email,
                attempts = result.attempts,
                "Recipient failed"
            );
        }

        Ok(())
    }

    /// Record the progress snapshot after a batch settles.
    ///
    /// # Errors
    /// Returns an error if the store rejects the event
    pub async fn batch_settled(&mut self) -> Result<(), StoreError> {
        self.batches_settled += 1;
        let event = CampaignEvent::Progress {
            sent: self.sent,
            failed: self.failed,
            current_batch: self.batches_settled as u64,
            total_batches: self.total_batches() as u64,
        };
        self.store.record(self.id(), event).await?;

        internal!(
            level = INFO,
            campaign_id = %self.id(),
            batch = self.batches_settled,
            batches = self.total_batches(),
            sent = self.sent,
            failed = self.failed,
            "Batch settled"
        );

        Ok(())
    }

    /// Record successful completion.
    ///
    /// # Errors
    /// Returns an error if the store rejects the event, e.g. because some
    /// recipient has no recorded outcome
    pub async fn complete(&self) -> Result<(), StoreError> {
        self.store
            .record(
                self.id(),
                CampaignEvent::Completed {
                    sent: self.sent,
                    failed: self.failed,
                },
            )
            .await?;

        internal!(
            level = INFO,
            campaign_id = %self.id(),
            sent = self.sent,
            failed = self.failed,
            "Campaign completed"
        );

        Ok(())
    }

    /// Recipients in batches that never started.
    fn undispatched(&self) -> &[Recipient] {
        &self.campaign.recipients[self.dispatched..]
    }

    /// Settle everything left and record the move to `Failed`.
    ///
    /// Outcomes that could not be recorded earlier are recorded again, and
    /// every recipient in a batch that never ran is recorded as failed with
    /// `not attempted: {reason}`, so the counters still add up to the
    /// recipient total. Store errors here are logged, never returned.
    pub async fn fail(&mut self, reason: &str) {
        tracing::error!(campaign_id = %self.id(), "Campaign failed: {reason}");

        let mut pending = std::mem::take(&mut self.unrecorded);
        pending.extend(self.undispatched().iter().map(|recipient| {
            SendResult::failed(&recipient.email, format!("not attempted: {reason}"), 0)
        }));

        for result in pending {
            let recipient = result.recipient_email.clone();
            if let Err(error) = self.record(result).await {
                tracing::warn!(
                    campaign_id = %self.id(),
                    recipient = %recipient,
                    "Failed to record outcome for failed campaign: {error}"
                );
            }
        }
        // Anything the store refused twice stays unrecorded
        self.unrecorded.clear();
        self.dispatched = self.campaign.recipients.len();

        if let Err(error) = self
            .store
            .record(
                self.id(),
                CampaignEvent::Failed {
                    error: reason.to_string(),
                },
            )
            .await
        {
            tracing::error!(
                campaign_id = %self.id(),
                "Failed to record campaign failure: {error}"
            );
        }
    }
}
