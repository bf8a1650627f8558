use async_trait::async_trait;
use herald_common::{internal, outgoing};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::{OutgoingMessage, Transport, TransportReceipt};
use crate::TransportError;

/// SMTP relay transport backed by `lettre`.
///
/// SMTP 4xx replies and connection problems map to
/// [`TransportError::Temporary`]; 5xx replies and messages that cannot be
/// built map to [`TransportError::Permanent`].
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    relay: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Build a relay transport.
    ///
    /// # Errors
    /// Returns an error if the STARTTLS relay cannot be configured for `host`
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        starttls: bool,
    ) -> Result<Self, TransportError> {
        let builder = if starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| TransportError::Permanent(format!("Invalid SMTP relay {host}: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let builder = match (username, password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(username, password)),
            (Some(username), None) => builder.credentials(Credentials::new(username, String::new())),
            _ => builder,
        };

        internal!(
            level = INFO,
            "SMTP transport configured for {host}:{port} (starttls: {starttls})"
        );

        Ok(Self {
            relay: builder.port(port).build(),
        })
    }

    fn build(message: &OutgoingMessage, message_id: &str) -> Result<Message, TransportError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| TransportError::Permanent(format!("Invalid from address: {e}")))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| TransportError::Permanent(format!("Invalid recipient address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .message_id(Some(message_id.to_string()));

        if let Some(reply_to) = &message.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| TransportError::Permanent(format!("Invalid reply-to address: {e}")))?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| TransportError::Permanent(format!("Failed to build message: {e}")))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<TransportReceipt, TransportError> {
        let message_id = format!("<{}@herald>", ulid::Ulid::new());
        let email = Self::build(message, &message_id)?;

        let response = self.relay.send(email).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::Permanent(e.to_string())
            } else {
                TransportError::Temporary(e.to_string())
            }
        })?;

        outgoing!(
            level = DEBUG,
            to = %message.to,
            message_id = %message_id,
            code = %response.code(),
            "Message accepted by SMTP relay"
        );

        Ok(TransportReceipt {
            message_id,
            status: response.code().to_string(),
        })
    }
}
