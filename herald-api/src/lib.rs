//! HTTP surface for the herald dispatch engine
//!
//! # Endpoints
//!
//! - **`POST /api/campaigns`** - Submit a campaign; answers 202 with a receipt
//! - **`GET /api/campaigns/{id}`** - Current status and counters
//! - **`GET /api/campaigns/{id}/events`** - Recorded lifecycle events
//! - **`GET /track/open`** - Open-tracking pixel
//! - **`GET /track/click`** - Click-tracking redirect
//! - **`GET /health/live`** - Liveness probe
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use herald_api::{ApiConfig, ApiServer};
//! use herald_dispatch::{CampaignService, DispatchConfig, LogTransport};
//! use herald_store::MemoryCampaignStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (shutdown, receiver) = tokio::sync::broadcast::channel(4);
//! let service = Arc::new(CampaignService::new(
//!     DispatchConfig::default(),
//!     Arc::new(MemoryCampaignStore::new()),
//!     Arc::new(LogTransport),
//!     shutdown,
//! ));
//!
//! let server = ApiServer::new(&ApiConfig::default(), service).await?;
//! server.serve(receiver).await?;
//! # Ok(())
//! # }
//! ```

mod campaigns;
mod config;
mod error;
mod server;
mod tracking;

pub use campaigns::CampaignSummary;
pub use config::ApiConfig;
pub use error::{ApiError, ErrorBody};
pub use server::{ApiServer, router};
