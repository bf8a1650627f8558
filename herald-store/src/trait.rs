use async_trait::async_trait;
use herald_common::{Campaign, CampaignEvent, CampaignId, RecordedEvent};

/// Process-wide storage for campaigns and their event history.
///
/// `record` is the only way a stored campaign changes: it applies the event
/// to the campaign and appends it to the history as one step, so concurrent
/// writers to the same campaign never interleave half-applied updates.
#[async_trait]
pub trait CampaignStore: Send + Sync + std::fmt::Debug {
    /// Store a newly accepted campaign.
    async fn insert(&self, campaign: Campaign) -> crate::Result<()>;

    /// Current state of a campaign.
    async fn get(&self, id: &CampaignId) -> crate::Result<Campaign>;

    /// Every stored campaign id, oldest first.
    async fn list(&self) -> crate::Result<Vec<CampaignId>>;

    /// Apply `event` to the campaign and append it to its history.
    ///
    /// Returns the sequence number assigned to the event.
    async fn record(&self, id: &CampaignId, event: CampaignEvent) -> crate::Result<u64>;

    /// The campaign's history, in the order events were recorded.
    async fn events(&self, id: &CampaignId) -> crate::Result<Vec<RecordedEvent>>;
}
