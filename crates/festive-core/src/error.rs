//! Error types for `festive-core`.

use thiserror::Error;

use crate::occasion::RuleError;

#[derive(Debug, Error)]
pub enum Error {
  /// A registry entry is malformed; detected while loading the calendar.
  #[error("invalid occasion {id:?}: {reason}")]
  InvalidOccasion { id: String, reason: String },

  #[error("duplicate occasion id: {0:?}")]
  DuplicateOccasion(String),

  /// A rule passed load-time checks but has no date in the requested year.
  #[error("occasion {id:?} cannot be resolved for {year}: {source}")]
  Unresolvable {
    id:     String,
    year:   i32,
    #[source]
    source: RuleError,
  },

  #[error("invalid registry document: {0}")]
  Registry(#[from] toml::de::Error),

  #[error("invalid target date {0:?}: expected MM-DD or YYYY-MM-DD")]
  InvalidTargetDate(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// `true` for errors that mean the occasion registry itself is unusable.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      Self::InvalidOccasion { .. }
        | Self::DuplicateOccasion(_)
        | Self::Unresolvable { .. }
        | Self::Registry(_)
        | Self::Serialization(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
