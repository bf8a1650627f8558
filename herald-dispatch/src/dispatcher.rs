//! Batch scheduler and sender
//!
//! Each batch is sent with one task per recipient. The driving task waits for
//! every send in the batch to settle, records the outcomes one at a time, then
//! waits out the inter-batch delay before starting the next batch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use herald_common::{
    Campaign, CampaignEvent, Recipient, SendResult, Signal, internal, tracing,
};
use herald_store::CampaignStore;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinSet,
};

use crate::{
    DispatchError, OutgoingMessage, Personalizer, ProgressAggregator, Sender, TrackingInjector,
    partition,
};

#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<dyn CampaignStore>,
    sender: Sender,
    personalizer: Personalizer,
    tracking: TrackingInjector,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        sender: Sender,
        personalizer: Personalizer,
        tracking: TrackingInjector,
    ) -> Self {
        Self {
            store,
            sender,
            personalizer,
            tracking,
        }
    }

    /// Personalise and instrument the campaign's template for one recipient.
    #[must_use]
    pub fn render(&self, campaign: &Campaign, recipient: &Recipient) -> OutgoingMessage {
        let personalised = self.personalizer.personalize(&campaign.template, recipient);
        let html = self.tracking.inject(
            &personalised.body,
            &campaign.id,
            &recipient.email,
            &campaign.send_options,
        );

        OutgoingMessage {
            to: recipient.email.clone(),
            subject: personalised.subject,
            html,
            from: campaign.sender_info.mailbox(),
            reply_to: campaign.sender_info.reply_to.clone(),
        }
    }

    /// Run the campaign in its own task and record `Failed` if that task dies.
    ///
    /// A panic inside [`Self::run`] loses the in-memory progress, so the
    /// recorded counters may fall short of the recipient total.
    pub async fn supervise(
        self: Arc<Self>,
        campaign: Arc<Campaign>,
        shutdown: broadcast::Receiver<Signal>,
    ) {
        let id = campaign.id;
        let store = self.store.clone();
        let task = tokio::spawn(async move { self.run(campaign, shutdown).await });

        if let Err(error) = task.await {
            tracing::error!(campaign_id = %id, "Dispatch task aborted: {error}");
            let event = CampaignEvent::Failed {
                error: format!("dispatch task aborted: {error}"),
            };
            if let Err(error) = store.record(&id, event).await {
                tracing::error!(campaign_id = %id, "Failed to record campaign failure: {error}");
            }
        }
    }

    /// Send every batch and drive the campaign to `Completed` or `Failed`.
    ///
    /// Any error in the batch loop is logged against the campaign and turns
    /// into a `Failed` status; nothing is returned to the caller.
    #[tracing::instrument(level = "debug", skip_all, fields(campaign_id = %campaign.id))]
    pub async fn run(&self, campaign: Arc<Campaign>, mut shutdown: broadcast::Receiver<Signal>) {
        let mut progress = ProgressAggregator::new(self.store.clone(), campaign.clone());

        if let Err(error) = self.process(&campaign, &mut progress, &mut shutdown).await {
            progress.fail(&error.to_string()).await;
        }
    }

    async fn process(
        &self,
        campaign: &Campaign,
        progress: &mut ProgressAggregator,
        shutdown: &mut broadcast::Receiver<Signal>,
    ) -> Result<(), DispatchError> {
        progress.start().await?;

        let delay = Duration::from_millis(campaign.send_options.delay_ms);
        for (index, batch) in
            partition(&campaign.recipients, campaign.send_options.batch_size).enumerate()
        {
            if index > 0 && !sleep_or_shutdown(delay, shutdown).await {
                internal!(
                    level = WARN,
                    campaign_id = %campaign.id,
                    batch = index + 1,
                    "Shutdown requested, abandoning remaining batches"
                );
                return Err(DispatchError::Shutdown);
            }

            internal!(
                level = DEBUG,
                campaign_id = %campaign.id,
                batch = index + 1,
                size = batch.len(),
                "Sending batch"
            );
            self.send_batch(campaign, batch, progress).await?;
            progress.batch_settled().await?;
        }

        progress.complete().await?;
        Ok(())
    }

    /// Send `batch` concurrently and record every outcome once it settles.
    ///
    /// A failed record does not stop the batch: the remaining outcomes are
    /// still collected and the first store error is returned afterwards.
    async fn send_batch(
        &self,
        campaign: &Campaign,
        batch: &[Recipient],
        progress: &mut ProgressAggregator,
    ) -> Result<(), DispatchError> {
        progress.begin_batch(batch.len());

        let mut sends = JoinSet::new();
        let mut recipients = HashMap::with_capacity(batch.len());
        for recipient in batch {
            let message = self.render(campaign, recipient);
            let sender = self.sender.clone();
            let handle = sends.spawn(async move { sender.send(&message).await });
            recipients.insert(handle.id(), recipient.email.clone());
        }

        let mut first_error = None;
        while let Some(joined) = sends.join_next_with_id().await {
            let result = match joined {
                Ok((_, result)) => result,
                Err(error) => {
                    let email = recipients.remove(&error.id()).unwrap_or_default();
                    tracing::error!(
                        campaign_id = %campaign.id,
                        recipient = %email,
                        "Send task did not complete: {error}"
                    );
                    SendResult::failed(email, format!("send task failed: {error}"), 1)
                }
            };

            if let Err(error) = progress.record(result).await {
                tracing::error!(
                    campaign_id = %campaign.id,
                    "Failed to record send outcome: {error}"
                );
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// Sleep for `duration` unless a shutdown signal arrives first.
///
/// Returns `true` if the full duration elapsed. A closed channel can never
/// deliver a shutdown, so the sleep then runs to completion.
pub(crate) async fn sleep_or_shutdown(
    duration: Duration,
    shutdown: &mut broadcast::Receiver<Signal>,
) -> bool {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    tokio::select! {
        () = &mut sleep => true,
        signal = shutdown.recv() => {
            if matches!(signal, Err(RecvError::Closed)) {
                sleep.await;
                true
            } else {
                false
            }
        }
    }
}
