//! Mail transports for greeting delivery.
//!
//! [`Mailer`] is the transport the server wires into the dispatch engine. It
//! is either a real SMTP relay or a log-only sink for development and dry
//! environments.

use festive_core::transport::{MailTransport, MessageId, OutgoingMessage, TransportError};
use serde::{Deserialize, Serialize};

pub mod error;
mod log;
mod smtp;

pub use error::{Error, Result};
pub use log::LogMailer;
pub use smtp::{SmtpConfig, SmtpMailer};

/// Which transport to build, selected by the `transport` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum MailConfig {
  /// Write greetings to the log instead of sending them.
  #[default]
  Log,
  Smtp(SmtpConfig),
}

pub enum Mailer {
  Smtp(SmtpMailer),
  Log(LogMailer),
}

impl Mailer {
  pub fn from_config(config: &MailConfig) -> Result<Self> {
    Ok(match config {
      MailConfig::Log => Self::Log(LogMailer),
      MailConfig::Smtp(smtp) => Self::Smtp(SmtpMailer::new(smtp)?),
    })
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Smtp(_) => "smtp",
      Self::Log(_) => "log",
    }
  }
}

impl MailTransport for Mailer {
  async fn send(&self, message: OutgoingMessage) -> Result<MessageId, TransportError> {
    match self {
      Self::Smtp(mailer) => mailer.send(message).await,
      Self::Log(mailer) => mailer.send(message).await,
    }
  }
}
