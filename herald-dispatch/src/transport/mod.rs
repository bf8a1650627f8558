//! Pluggable message transport
//!
//! The dispatcher hands one fully rendered message per recipient to a
//! [`Transport`]. Implementations report failures as [`TransportError`]s,
//! classified as temporary or permanent so the retry policy knows whether to
//! try again.

mod log;
#[cfg(feature = "smtp")]
mod smtp;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
pub use log::LogTransport;
use serde::Deserialize;
#[cfg(feature = "smtp")]
pub use smtp::SmtpTransport;

use crate::TransportError;

/// One rendered message, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// `Name <email>` or a bare address
    pub from: String,
    pub reply_to: Option<String>,
}

/// What the transport reports for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReceipt {
    pub message_id: String,
    pub status: String,
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver a single message.
    ///
    /// # Errors
    /// Returns a [`TransportError`] describing whether the failure is worth
    /// retrying
    async fn send(&self, message: &OutgoingMessage) -> Result<TransportReceipt, TransportError>;
}

/// Transport selection
///
/// # Examples
///
/// ```ron
/// Herald (
///     transport: Smtp(
///         host: "smtp.example.com",
///         port: 587,
///         username: Some("mailer"),
///         password: Some("secret"),
///         starttls: true,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub enum TransportConfig {
    /// Log every message and report it as accepted
    #[default]
    Log,

    #[cfg(feature = "smtp")]
    Smtp {
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default = "default_starttls")]
        starttls: bool,
    },
}

#[cfg(feature = "smtp")]
const fn default_smtp_port() -> u16 {
    587
}

#[cfg(feature = "smtp")]
const fn default_starttls() -> bool {
    true
}

impl TransportConfig {
    /// Build the configured transport.
    ///
    /// # Errors
    /// Returns an error if the SMTP relay cannot be set up
    pub fn into_transport(self) -> Result<Arc<dyn Transport>, TransportError> {
        match self {
            Self::Log => Ok(Arc::new(LogTransport::new())),
            #[cfg(feature = "smtp")]
            Self::Smtp {
                host,
                port,
                username,
                password,
                starttls,
            } => Ok(Arc::new(SmtpTransport::new(
                &host, port, username, password, starttls,
            )?)),
        }
    }
}
