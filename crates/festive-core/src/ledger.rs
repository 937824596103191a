//! Vocabulary of the dedup ledger (the "Dedup Guard").
//!
//! A ledger row proves that a greeting for `(occasion, contact, year)` was
//! reserved, and once `sent_at` is set, delivered to the transport. Rows are
//! never rewritten after commit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one annual delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchKey {
  pub occasion_id:   String,
  pub contact_id:    Uuid,
  /// Year of the resolved send date, so a computed occasion that moves between
  /// years still gets a fresh key every year.
  pub occasion_year: i32,
}

impl DispatchKey {
  pub fn new(occasion_id: impl Into<String>, contact_id: Uuid, send_date: NaiveDate) -> Self {
    use chrono::Datelike as _;
    Self {
      occasion_id: occasion_id.into(),
      contact_id,
      occasion_year: send_date.year(),
    }
  }
}

/// A persisted ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
  pub occasion_id:   String,
  pub contact_id:    Uuid,
  pub occasion_year: i32,
  pub reserved_at:   DateTime<Utc>,
  /// Set once the transport acknowledged the message.
  pub sent_at:       Option<DateTime<Utc>>,
  pub message_id:    Option<String>,
}

impl DispatchRecord {
  pub fn key(&self) -> DispatchKey {
    DispatchKey {
      occasion_id:   self.occasion_id.clone(),
      contact_id:    self.contact_id,
      occasion_year: self.occasion_year,
    }
  }

  pub fn is_committed(&self) -> bool { self.sent_at.is_some() }
}

/// Outcome of an insert-if-absent reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
  /// This caller owns the key and may send.
  Reserved,
  /// Another send (this run, an earlier run, or a concurrent run) holds it.
  AlreadyReserved,
}
