use std::sync::Arc;

use herald_common::internal;
use serde::Deserialize;

use crate::{backends::MemoryCampaignStore, r#trait::CampaignStore};

/// Configuration for the campaign store
///
/// # Examples
///
/// Unlimited memory store in RON config:
/// ```ron
/// Herald (
///     store: Memory(capacity: None),
/// )
/// ```
///
/// Memory store with a capacity limit:
/// ```ron
/// Herald (
///     store: Memory(
///         capacity: Some(10000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    /// In-process store; contents are lost on exit
    Memory {
        /// Maximum number of campaigns to keep (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory { capacity: None }
    }
}

impl StoreConfig {
    /// Build the configured store as a shareable trait object
    #[must_use]
    pub fn into_store(self) -> Arc<dyn CampaignStore> {
        match self {
            Self::Memory {
                capacity: Some(capacity),
            } => {
                internal!(level = INFO, "Using memory campaign store (capacity {capacity})");
                Arc::new(MemoryCampaignStore::with_capacity(capacity))
            }
            Self::Memory { capacity: None } => {
                internal!(level = INFO, "Using memory campaign store (unbounded)");
                Arc::new(MemoryCampaignStore::new())
            }
        }
    }
}
