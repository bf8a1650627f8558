use std::sync::Arc;

use herald_common::{SendResult, outgoing};

use crate::{OutgoingMessage, RetryPolicy, Transport};

/// Sends one message per call, retrying temporary failures.
///
/// Always returns a terminal [`SendResult`]; a failed send never surfaces as
/// an error to the batch.
#[derive(Debug, Clone)]
pub struct Sender {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Sender {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub async fn send(&self, message: &OutgoingMessage) -> SendResult {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.transport.send(message).await {
                Ok(receipt) => {
                    outgoing!(
                        level = DEBUG,
                        recipient = %message.to,
                        message_id = %receipt.message_id,
                        attempts,
                        "Sent"
                    );
                    return SendResult::sent(&message.to, receipt.message_id, attempts);
                }
                Err(error) if error.is_temporary() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.delay_after(attempts);
                    outgoing!(
                        level = WARN,
                        recipient = %message.to,
                        attempts,
                        "Temporary send failure, retrying in {delay:?}: {error}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    outgoing!(
                        level = WARN,
                        recipient = %message.to,
                        attempts,
                        transport = self.transport.name(),
                        "Send failed: {error}"
                    );
                    return SendResult::failed(&message.to, error.to_string(), attempts);
                }
            }
        }
    }
}
