use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use herald_common::{Campaign, CampaignEvent, Signal, internal};
use herald_store::CampaignStore;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::{DispatchError, Dispatcher, dispatcher::sleep_or_shutdown};

/// Timer-based scheduling for campaigns submitted with a `scheduledTime`.
///
/// The campaign is recorded as `Scheduled` straight away; dispatch starts once
/// the time arrives. A time already in the past fires immediately. Shutdown
/// before the time arrives abandons the campaign, leaving it `Scheduled`.
#[derive(Debug, Clone)]
pub struct DeferredDispatch {
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<Dispatcher>,
    tracker: TaskTracker,
}

impl DeferredDispatch {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<Dispatcher>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            store,
            dispatcher,
            tracker,
        }
    }

    /// Record the campaign as scheduled and start its timer.
    ///
    /// # Errors
    /// Returns an error if the `Scheduled` event cannot be recorded, in which
    /// case no timer is started
    pub async fn schedule(
        &self,
        campaign: Arc<Campaign>,
        at: DateTime<Utc>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), DispatchError> {
        self.store
            .record(&campaign.id, CampaignEvent::Scheduled { scheduled_for: at })
            .await?;

        let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        internal!(
            level = INFO,
            campaign_id = %campaign.id,
            scheduled_for = %at,
            "Campaign scheduled, dispatch in {wait:?}"
        );

        let dispatcher = self.dispatcher.clone();
        self.tracker.spawn(async move {
            if sleep_or_shutdown(wait, &mut shutdown).await {
                dispatcher.supervise(campaign, shutdown).await;
            } else {
                internal!(
                    level = WARN,
                    campaign_id = %campaign.id,
                    "Shutdown before scheduled time, campaign left scheduled"
                );
            }
        });

        Ok(())
    }
}
