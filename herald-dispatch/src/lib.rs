//! Campaign intake and batch dispatch
//!
//! This crate provides functionality to:
//! - Validate campaign submissions before any work starts
//! - Personalise and instrument each recipient's copy of the template
//! - Send recipients in sequential, rate-limited batches with bounded retry
//! - Record lifecycle events and progress in the campaign store
//! - Defer dispatch of campaigns scheduled for a later time

mod batch;
mod config;
mod dispatcher;
mod error;
mod personalize;
mod progress;
mod retry;
mod scheduler;
mod sender;
mod service;
pub mod tracking;
pub mod transport;
mod validate;

pub use batch::{batch_count, estimate_duration, partition};
pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, TransportError};
pub use personalize::Personalizer;
pub use progress::ProgressAggregator;
pub use retry::{RetryPolicy, backoff_delay};
pub use scheduler::DeferredDispatch;
pub use sender::Sender;
pub use service::{CampaignService, SubmissionReceipt};
pub use tracking::TrackingInjector;
pub use transport::{
    LogTransport, OutgoingMessage, Transport, TransportConfig, TransportReceipt,
};
pub use validate::Validator;
