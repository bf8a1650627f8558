//! Campaign intake
//!
//! [`CampaignService`] is the entry point for everything outside the crate:
//! it validates and stores a submission, hands it to the batch scheduler
//! (now or at its scheduled time) and returns a receipt without waiting for
//! any message to be sent.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use herald_common::{
    Campaign, CampaignEvent, CampaignId, CampaignRequest, CampaignStatus, EventError,
    RecordedEvent, Signal, incoming, internal,
};
use herald_store::{CampaignStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::{
    DeferredDispatch, DispatchConfig, DispatchError, Dispatcher, Personalizer, Sender,
    TrackingInjector, Transport, Validator, estimate_duration,
};

/// Acknowledgement returned as soon as a campaign is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub campaign_id: CampaignId,
    pub total_recipients: u64,
    /// `processing` for immediate dispatch, `scheduled` otherwise
    pub status: CampaignStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Static estimate; never updated as the campaign runs
    pub estimated_completion: DateTime<Utc>,
    pub estimated_duration_ms: u64,
    pub tracking_url: String,
}

#[derive(Debug)]
pub struct CampaignService {
    config: DispatchConfig,
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<Dispatcher>,
    scheduler: DeferredDispatch,
    tracking: TrackingInjector,
    tracker: TaskTracker,
    shutdown: broadcast::Sender<Signal>,
}

impl CampaignService {
    /// Wire up intake, scheduling and dispatch.
    ///
    /// Running campaigns subscribe to `shutdown` and stop between batches
    /// once it fires.
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn CampaignStore>,
        transport: Arc<dyn Transport>,
        shutdown: broadcast::Sender<Signal>,
    ) -> Self {
        internal!(
            level = INFO,
            transport = transport.name(),
            "Initialising campaign service"
        );

        let tracking = TrackingInjector::new(&config.tracking_base_url);
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            Sender::new(transport, config.retry.clone()),
            Personalizer::new(&config.fallback_name),
            tracking.clone(),
        ));
        let tracker = TaskTracker::new();
        let scheduler = DeferredDispatch::new(store.clone(), dispatcher.clone(), tracker.clone());

        Self {
            config,
            store,
            dispatcher,
            scheduler,
            tracking,
            tracker,
            shutdown,
        }
    }

    #[must_use]
    pub const fn tracking(&self) -> &TrackingInjector {
        &self.tracking
    }

    /// Number of campaigns currently running or waiting for their scheduled time.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Accept a campaign.
    ///
    /// Returns once the campaign is stored and its dispatch has been handed
    /// off. Submitting the same payload twice creates two campaigns and sends
    /// everything twice.
    ///
    /// # Errors
    /// Returns [`DispatchError::Validation`] if the submission is malformed;
    /// nothing is stored or sent in that case. Any other error means dispatch
    /// could not be set up.
    pub async fn submit(&self, request: CampaignRequest) -> Result<SubmissionReceipt, DispatchError> {
        let now = Utc::now();
        let campaign = match Validator::new(&self.config).validate(request, now) {
            Ok(campaign) => campaign,
            Err(error) => {
                incoming!(level = INFO, "Rejected campaign submission: {error}");
                return Err(error.into());
            }
        };

        let estimate = estimate_duration(
            campaign.recipients.len(),
            campaign.send_options.batch_size,
            campaign.send_options.delay_ms,
            self.config.per_recipient_estimate_ms,
        );

        let campaign = Arc::new(campaign);
        self.store.insert(campaign.as_ref().clone()).await?;

        incoming!(
            level = INFO,
            campaign_id = %campaign.id,
            name = %campaign.name,
            recipients = campaign.recipients.len(),
            batches = campaign.batch_count(),
            "Accepted campaign"
        );

        let (status, starts_at) = match campaign.scheduled_time {
            Some(at) => {
                self.scheduler
                    .schedule(campaign.clone(), at, self.shutdown.subscribe())
                    .await?;
                (CampaignStatus::Scheduled, at.max(now))
            }
            None => {
                self.tracker.spawn(
                    self.dispatcher
                        .clone()
                        .supervise(campaign.clone(), self.shutdown.subscribe()),
                );
                (CampaignStatus::Processing, now)
            }
        };

        Ok(SubmissionReceipt {
            campaign_id: campaign.id,
            total_recipients: campaign.stats.total_recipients,
            status,
            scheduled_time: campaign.scheduled_time,
            estimated_completion: starts_at
                + TimeDelta::from_std(estimate).unwrap_or(TimeDelta::zero()),
            estimated_duration_ms: u64::try_from(estimate.as_millis()).unwrap_or(u64::MAX),
            tracking_url: self.tracking.campaign_url(&campaign.id),
        })
    }

    /// # Errors
    /// Returns an error if the campaign does not exist
    pub async fn campaign(&self, id: &CampaignId) -> Result<Campaign, DispatchError> {
        Ok(self.store.get(id).await?)
    }

    /// # Errors
    /// Returns an error if the campaign does not exist
    pub async fn events(&self, id: &CampaignId) -> Result<Vec<RecordedEvent>, DispatchError> {
        Ok(self.store.events(id).await?)
    }

    /// Register that `email` opened a message from the campaign.
    ///
    /// Returns `false` if the open was already counted.
    ///
    /// # Errors
    /// Returns an error if the campaign does not exist or `email` is not one
    /// of its recipients
    pub async fn record_open(&self, id: &CampaignId, email: &str) -> Result<bool, DispatchError> {
        let event = CampaignEvent::Opened {
            recipient: email.to_string(),
        };
        if !self.record_engagement(id, event).await? {
            return Ok(false);
        }
        incoming!(level = DEBUG, campaign_id = %id, recipient = %email, "Open recorded");
        Ok(true)
    }

    /// Register that `email` followed a link to `url`.
    ///
    /// Returns `false` if the click was not counted, because this link was
    /// already clicked or the recipient reached
    /// [`MAX_TRACKED_LINKS`](herald_common::MAX_TRACKED_LINKS).
    ///
    /// # Errors
    /// Returns an error if the campaign does not exist or `email` is not one
    /// of its recipients
    pub async fn record_click(
        &self,
        id: &CampaignId,
        email: &str,
        url: &str,
    ) -> Result<bool, DispatchError> {
        let event = CampaignEvent::Clicked {
            recipient: email.to_string(),
            url: url.to_string(),
        };
        if !self.record_engagement(id, event).await? {
            return Ok(false);
        }
        incoming!(level = DEBUG, campaign_id = %id, recipient = %email, url = %url, "Click recorded");
        Ok(true)
    }

    async fn record_engagement(
        &self,
        id: &CampaignId,
        event: CampaignEvent,
    ) -> Result<bool, DispatchError> {
        match self.store.record(id, event).await {
            Ok(_) => Ok(true),
            Err(StoreError::Event {
                source: EventError::AlreadyRecorded,
                ..
            }) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Stop accepting background work and wait for running campaigns.
    ///
    /// Campaigns observe the shutdown broadcast between batches, so this
    /// should be called after the signal is sent. Returns `false` if some
    /// campaign was still running when `timeout` elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            internal!(
                level = INFO,
                "Waiting up to {timeout:?} for {in_flight} campaign(s) to settle"
            );
        }

        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}
