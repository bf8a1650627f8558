//! Campaign storage
//!
//! Campaigns and their lifecycle events live behind the [`CampaignStore`]
//! trait so that intake, dispatch and the HTTP surface share one handle to
//! process-wide state. The in-memory backend is the only one shipped; its
//! contents do not survive a restart.

pub mod backends;
pub mod config;
pub mod error;
pub mod r#trait;

pub use backends::{MemoryCampaignStore, TestCampaignStore};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use r#trait::CampaignStore;
