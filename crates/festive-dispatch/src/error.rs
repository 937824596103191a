//! Run-fatal errors.
//!
//! Anything scoped to one contact, user, or occasion is recorded in
//! [`RunStats::errors`](festive_core::stats::RunStats) instead and never
//! surfaces here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The calendar has an occasion with no date in the target year.
  #[error("occasion calendar cannot be resolved for {year}: {source}")]
  Configuration {
    year:   i32,
    #[source]
    source: festive_core::Error,
  },

  /// A preference or contact lookup failed in a way that makes the rest of
  /// the run meaningless.
  #[error("discovery failed while processing {occasion_id:?}: {reason}")]
  Discovery { occasion_id: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
