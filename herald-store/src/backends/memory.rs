use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use herald_common::{Campaign, CampaignEvent, CampaignId, RecordedEvent};

use crate::{StoreError, r#trait::CampaignStore};

#[derive(Debug, Clone)]
struct Entry {
    campaign: Campaign,
    events: Vec<RecordedEvent>,
}

/// In-memory campaign store
///
/// Campaigns are held in a `DashMap`, so writes to different campaigns never
/// contend and `record` holds the shard lock for exactly one apply + append.
///
/// # Capacity Management
/// An optional capacity bounds the number of campaigns kept. Inserting past
/// it fails with [`StoreError::CapacityExceeded`]; nothing is evicted.
///
/// Everything is lost when the process exits. A campaign interrupted by
/// process termination is simply gone, along with its partial results.
#[derive(Debug, Clone, Default)]
pub struct MemoryCampaignStore {
    campaigns: Arc<DashMap<CampaignId, Entry>>,
    capacity: Option<usize>,
}

impl MemoryCampaignStore {
    /// Create an empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `capacity` campaigns
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            campaigns: Arc::new(DashMap::new()),
            capacity: Some(capacity),
        }
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn insert(&self, campaign: Campaign) -> crate::Result<()> {
        if let Some(capacity) = self.capacity {
            let len = self.campaigns.len();
            if len >= capacity {
                return Err(StoreError::CapacityExceeded { len, capacity });
            }
        }

        match self.campaigns.entry(campaign.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists(campaign.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Entry {
                    campaign,
                    events: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, id: &CampaignId) -> crate::Result<Campaign> {
        self.campaigns
            .get(id)
            .map(|entry| entry.campaign.clone())
            .ok_or(StoreError::NotFound(*id))
    }

    async fn list(&self) -> crate::Result<Vec<CampaignId>> {
        let mut ids: Vec<_> = self.campaigns.iter().map(|entry| *entry.key()).collect();

        // ULIDs are lexicographically sortable by creation time
        ids.sort();

        Ok(ids)
    }

    async fn record(&self, id: &CampaignId, event: CampaignEvent) -> crate::Result<u64> {
        let mut entry = self
            .campaigns
            .get_mut(id)
            .ok_or(StoreError::NotFound(*id))?;

        let recorded_at = Utc::now();
        entry
            .campaign
            .apply(&event, recorded_at)
            .map_err(|source| StoreError::Event { id: *id, source })?;

        let sequence = entry.events.len() as u64;
        entry.events.push(RecordedEvent {
            sequence,
            recorded_at,
            event,
        });

        Ok(sequence)
    }

    async fn events(&self, id: &CampaignId) -> crate::Result<Vec<RecordedEvent>> {
        self.campaigns
            .get(id)
            .map(|entry| entry.events.clone())
            .ok_or(StoreError::NotFound(*id))
    }
}
