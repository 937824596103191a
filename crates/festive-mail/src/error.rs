use thiserror::Error;

/// Errors raised while building a transport from configuration.
#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid sender address: {0:?}")]
  InvalidSender(String),

  #[error("smtp relay setup failed: {0}")]
  Relay(#[from] lettre::transport::smtp::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
