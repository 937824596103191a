//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Market lists are compact JSON arrays.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use festive_core::{
  contact::{Contact, ContactStatus, UserProfile},
  ledger::DispatchRecord,
  preference::UserPreference,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ContactStatus ────────────────────────────────────────────────────────────

pub fn encode_status(status: ContactStatus) -> String { status.to_string() }

pub fn decode_status(s: &str) -> Result<ContactStatus> {
  ContactStatus::from_str(s).map_err(|_| Error::UnknownStatus(s.to_owned()))
}

// ─── Markets ─────────────────────────────────────────────────────────────────

pub fn encode_markets(markets: &[String]) -> Result<String> {
  Ok(serde_json::to_string(markets)?)
}

pub fn decode_markets(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `contacts` row.
pub struct RawContact {
  pub contact_id:   String,
  pub user_id:      String,
  pub email:        String,
  pub display_name: Option<String>,
  pub status:       String,
}

impl RawContact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:   row.get(0)?,
      user_id:      row.get(1)?,
      email:        row.get(2)?,
      display_name: row.get(3)?,
      status:       row.get(4)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:   decode_uuid(&self.contact_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      email:        self.email,
      display_name: self.display_name,
      status:       decode_status(&self.status)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawProfile {
  pub user_id:   String,
  pub email:     String,
  pub full_name: Option<String>,
  pub company:   Option<String>,
  pub markets:   String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<UserProfile> {
    Ok(UserProfile {
      user_id:   decode_uuid(&self.user_id)?,
      email:     self.email,
      full_name: self.full_name,
      company:   self.company,
      markets:   decode_markets(&self.markets)?,
    })
  }
}

/// Raw values read directly from a `preferences` row.
pub struct RawPreference {
  pub user_id:     String,
  pub occasion_id: String,
  pub enabled:     bool,
  pub updated_at:  String,
}

impl RawPreference {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      occasion_id: row.get(1)?,
      enabled:     row.get(2)?,
      updated_at:  row.get(3)?,
    })
  }

  pub fn into_preference(self) -> Result<UserPreference> {
    Ok(UserPreference {
      user_id:     decode_uuid(&self.user_id)?,
      occasion_id: self.occasion_id,
      enabled:     self.enabled,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `dispatch_records` row.
pub struct RawRecord {
  pub occasion_id:   String,
  pub contact_id:    String,
  pub occasion_year: i32,
  pub reserved_at:   String,
  pub sent_at:       Option<String>,
  pub message_id:    Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      occasion_id:   row.get(0)?,
      contact_id:    row.get(1)?,
      occasion_year: row.get(2)?,
      reserved_at:   row.get(3)?,
      sent_at:       row.get(4)?,
      message_id:    row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<DispatchRecord> {
    Ok(DispatchRecord {
      occasion_id:   self.occasion_id,
      contact_id:    decode_uuid(&self.contact_id)?,
      occasion_year: self.occasion_year,
      reserved_at:   decode_dt(&self.reserved_at)?,
      sent_at:       self.sent_at.as_deref().map(decode_dt).transpose()?,
      message_id:    self.message_id,
    })
  }
}
