//! Mock transport for testing dispatch scenarios
//!
//! This module provides a configurable transport that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Fail selected recipients permanently, or temporarily for a number of calls
//! - Panic mid-send for selected recipients
//! - Delay every send to simulate transport latency
//! - Record every message it was handed
//! - Track how many sends were in flight at once
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = MockTransport::new()
//!     .with_latency(Duration::from_millis(10))
//!     .failing_permanently("bounce@example.com")
//!     .failing_temporarily("flaky@example.com", 2)
//!     .build();
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use herald_dispatch::{OutgoingMessage, Transport, TransportError, TransportReceipt};

#[derive(Debug, Default)]
pub struct MockTransport {
    latency: Duration,
    permanent: HashSet<String>,
    panicking: HashSet<String>,
    temporary: Mutex<HashMap<String, u32>>,
    delivered: Mutex<Vec<OutgoingMessage>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject every send to `email` with a permanent error.
    pub fn failing_permanently(mut self, email: impl Into<String>) -> Self {
        self.permanent.insert(email.into());
        self
    }

    /// Panic inside the send task for `email`.
    pub fn panicking_for(mut self, email: impl Into<String>) -> Self {
        self.panicking.insert(email.into());
        self
    }

    /// Reject the first `times` sends to `email` with a temporary error.
    pub fn failing_temporarily(self, email: impl Into<String>, times: u32) -> Self {
        self.temporary
            .lock()
            .unwrap()
            .insert(email.into(), times);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Total `send` calls, including failed attempts.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most sends observed in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Messages accepted, in the order they were accepted.
    pub fn delivered(&self) -> Vec<OutgoingMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_to(&self, email: &str) -> Option<OutgoingMessage> {
        self.delivered().into_iter().find(|message| message.to == email)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<TransportReceipt, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(
            !self.panicking.contains(&message.to),
            "transport blew up sending to {}",
            message.to
        );

        if self.permanent.contains(&message.to) {
            return Err(TransportError::Permanent(format!(
                "550 mailbox unavailable: {}",
                message.to
            )));
        }

        {
            let mut temporary = self.temporary.lock().unwrap();
            if let Some(remaining) = temporary.get_mut(&message.to) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError::Temporary("421 try again later".to_string()));
                }
            }
        }

        self.delivered.lock().unwrap().push(message.clone());
        Ok(TransportReceipt {
            message_id: format!("<mock-{call}@test>"),
            status: "250".to_string(),
        })
    }
}
