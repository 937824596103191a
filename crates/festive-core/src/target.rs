//! Resolution of the date a dispatch run targets.
//!
//! "Today" is never read from a global clock here. Callers compute it once in
//! the reference time zone and pass it in.

use chrono::{NaiveDate, Utc};

use crate::{Error, Result};

/// Resolve an optional override against `today`.
///
/// Accepted override forms are `MM-DD` (year taken from `today`) and
/// `YYYY-MM-DD` (explicit backfill). Dates that do not exist, such as `02-29`
/// in a common year, are rejected.
pub fn resolve_target(override_date: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
  let Some(raw) = override_date.map(str::trim) else {
    return Ok(today);
  };
  parse_override(raw, today).ok_or_else(|| Error::InvalidTargetDate(raw.to_owned()))
}

fn parse_override(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
  use chrono::Datelike as _;

  let parts: Vec<&str> = raw.split('-').collect();
  match parts.as_slice() {
    [month, day] => {
      let month = two_digits(month)?;
      let day = two_digits(day)?;
      NaiveDate::from_ymd_opt(today.year(), month, day)
    }
    [year, month, day] if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) => {
      let year: i32 = year.parse().ok()?;
      NaiveDate::from_ymd_opt(year, two_digits(month)?, two_digits(day)?)
    }
    _ => None,
  }
}

fn two_digits(s: &str) -> Option<u32> {
  if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
    s.parse().ok()
  } else {
    None
  }
}

/// The current calendar date in `tz`.
pub fn today_in<Tz: chrono::TimeZone>(tz: &Tz) -> NaiveDate {
  Utc::now().with_timezone(tz).date_naive()
}
