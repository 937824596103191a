//! Per-run statistics, the single output of a dispatch run.
//!
//! Stats are ephemeral: they are returned to the caller and logged, never
//! stored. The dedup ledger is the durable record of what was sent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to one contact in one occasion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
  /// Reserved, sent, and committed.
  Sent,
  /// Reserved (or reservation failed) but the greeting did not go out.
  Failed(String),
  /// The ledger already holds this key.
  Duplicate,
  /// Dry run: would have been sent.
  Planned,
}

/// One isolated failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
  pub occasion_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id:     Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_id:  Option<Uuid>,
  pub reason:      String,
}

/// Counters and error detail for one dispatch run.
///
/// `attempted == succeeded + failed` always holds. Duplicate skips are
/// counted apart from failures, and lookup failures only add to `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
  pub target_date:        NaiveDate,
  pub calendar_version:   String,
  pub matched_occasions:  Vec<String>,
  pub attempted:          usize,
  pub succeeded:          usize,
  pub failed:             usize,
  pub skipped_duplicates: usize,
  /// Dry runs only: greetings that would have been sent.
  pub planned:            usize,
  pub dry_run:            bool,
  pub cancelled:          bool,
  pub errors:             Vec<RunError>,
}

impl RunStats {
  pub fn new(target_date: NaiveDate, calendar_version: impl Into<String>, dry_run: bool) -> Self {
    Self {
      target_date,
      calendar_version: calendar_version.into(),
      matched_occasions: Vec::new(),
      attempted: 0,
      succeeded: 0,
      failed: 0,
      skipped_duplicates: 0,
      planned: 0,
      dry_run,
      cancelled: false,
      errors: Vec::new(),
    }
  }

  pub fn record_match(&mut self, occasion_id: &str) {
    self.matched_occasions.push(occasion_id.to_owned());
  }

  /// A preference or contact lookup failed for a single occasion or user.
  pub fn record_lookup_failure(
    &mut self,
    occasion_id: &str,
    user_id: Option<Uuid>,
    reason: impl Into<String>,
  ) {
    self.errors.push(RunError {
      occasion_id: occasion_id.to_owned(),
      user_id,
      contact_id: None,
      reason: reason.into(),
    });
  }

  pub fn record_outcome(
    &mut self,
    occasion_id: &str,
    user_id: Uuid,
    contact_id: Uuid,
    outcome: SendOutcome,
  ) {
    match outcome {
      SendOutcome::Sent => {
        self.attempted += 1;
        self.succeeded += 1;
      }
      SendOutcome::Failed(reason) => {
        self.attempted += 1;
        self.failed += 1;
        self.errors.push(RunError {
          occasion_id: occasion_id.to_owned(),
          user_id: Some(user_id),
          contact_id: Some(contact_id),
          reason,
        });
      }
      SendOutcome::Duplicate => self.skipped_duplicates += 1,
      SendOutcome::Planned => self.planned += 1,
    }
  }
}
