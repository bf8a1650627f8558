use async_trait::async_trait;
use herald_common::outgoing;

use super::{OutgoingMessage, Transport, TransportReceipt};
use crate::TransportError;

/// Development transport: logs each message and accepts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl LogTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<TransportReceipt, TransportError> {
        let message_id = format!("<{}@herald>", ulid::Ulid::new());

        outgoing!(
            level = INFO,
            to = %message.to,
            from = %message.from,
            subject = %message.subject,
            bytes = message.html.len(),
            message_id = %message_id,
            "Message accepted by log transport"
        );

        Ok(TransportReceipt {
            message_id,
            status: "logged".to_string(),
        })
    }
}
