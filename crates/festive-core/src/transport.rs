//! The mail-transport contract.
//!
//! A transport accepts one rendered message and reports whether the provider
//! took it. It never retries; the dispatch engine decides what a failure
//! means for the dedup ledger.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fully rendered greeting, ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
  pub to:      String,
  pub to_name: Option<String>,
  pub subject: String,
  /// Plain-text body.
  pub body:    String,
  /// Copy for the sending user, when configured.
  pub cc:      Option<String>,
  pub tags:    Vec<String>,
}

/// Provider-assigned (or transport-generated) identifier of an accepted
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("invalid address: {0}")]
  InvalidAddress(String),

  #[error("message could not be built: {0}")]
  Build(String),

  #[error("provider rejected the message: {0}")]
  Rejected(String),

  #[error("provider unreachable: {0}")]
  Unavailable(String),
}

/// Anything that can deliver an [`OutgoingMessage`].
pub trait MailTransport: Send + Sync {
  fn send(
    &self,
    message: OutgoingMessage,
  ) -> impl Future<Output = Result<MessageId, TransportError>> + Send + '_;
}
