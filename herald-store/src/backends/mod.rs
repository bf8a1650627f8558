//! Backend storage implementations for campaigns
//!
//! - `memory`: in-process storage keyed by campaign id
//! - `test`: memory storage with hooks for waiting on and failing writes

pub mod memory;

pub use memory::MemoryCampaignStore;
pub use test::TestCampaignStore;
