//! Occasion definitions and their date-resolution rules.
//!
//! An occasion is immutable once the registry is loaded. Its [`DateRule`]
//! separates the kind of rule from its parameters, so the matcher never needs
//! to know how a date was produced.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::computus;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a rule cannot produce a date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
  #[error("month {0} is out of range")]
  Month(u32),

  #[error("{month:02}-{day:02} is not a calendar day")]
  NoSuchDay { month: u32, day: u32 },

  #[error("February 29 is not allowed for fixed occasions")]
  LeapDay,

  #[error("ordinal {0} is out of range (1..=4, or -1 for the last)")]
  Ordinal(i8),

  #[error("year {0} is outside the supported calendar range")]
  Year(i32),

  #[error("{algorithm} has no known date for {year}")]
  NoDateForYear {
    algorithm: ComputedAlgorithm,
    year:      i32,
  },
}

// ─── Computed algorithms ─────────────────────────────────────────────────────

/// Date algorithms that need more than a month/day pair.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComputedAlgorithm {
  /// Gregorian Easter Sunday.
  WesternEaster,
  /// Two days before Gregorian Easter.
  GoodFriday,
  /// Eastern Orthodox Easter (Julian computus), as a Gregorian date.
  OrthodoxEaster,
  /// First day of the Chinese lunisolar year.
  LunarNewYear,
}

impl ComputedAlgorithm {
  pub fn resolve(self, year: i32) -> Result<NaiveDate, RuleError> {
    let date = match self {
      Self::WesternEaster => computus::western_easter(year),
      Self::GoodFriday => computus::western_easter(year)
        .and_then(|easter| easter.checked_sub_days(Days::new(2))),
      Self::OrthodoxEaster => computus::orthodox_easter(year),
      Self::LunarNewYear => computus::lunar_new_year(year),
    };
    date.ok_or(RuleError::NoDateForYear { algorithm: self, year })
  }
}

// ─── DateRule ────────────────────────────────────────────────────────────────

/// Ordinal value meaning "the last such weekday of the month".
pub const LAST: i8 = -1;

/// How an occasion's concrete date is computed for a given year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateRule {
  /// The same calendar day every year.
  Fixed { month: u32, day: u32 },
  /// The `ordinal`-th `weekday` of `month`, counted from the 1st. An ordinal
  /// of [`LAST`] selects the final occurrence.
  NthWeekday {
    month:   u32,
    weekday: Weekday,
    ordinal: i8,
  },
  /// A date produced by a calendrical algorithm.
  Computed { algorithm: ComputedAlgorithm },
}

impl DateRule {
  /// Year-independent checks, run once when the registry is loaded.
  ///
  /// An `NthWeekday` ordinal of 5 is rejected: a fifth occurrence only exists
  /// in some years, so it would fail at dispatch time instead of load time.
  pub fn validate(&self) -> Result<(), RuleError> {
    match *self {
      Self::Fixed { month, day } => {
        check_month(month)?;
        if month == 2 && day == 29 {
          return Err(RuleError::LeapDay);
        }
        // 2001 is a common year, so this rejects any day that is missing in
        // at least one year.
        NaiveDate::from_ymd_opt(2001, month, day)
          .map(|_| ())
          .ok_or(RuleError::NoSuchDay { month, day })
      }
      Self::NthWeekday { month, ordinal, .. } => {
        check_month(month)?;
        if ordinal == LAST || (1..=4).contains(&ordinal) {
          Ok(())
        } else {
          Err(RuleError::Ordinal(ordinal))
        }
      }
      Self::Computed { .. } => Ok(()),
    }
  }

  /// Resolve the rule to a concrete date in `year`.
  pub fn resolve(&self, year: i32) -> Result<NaiveDate, RuleError> {
    self.validate()?;
    if NaiveDate::from_ymd_opt(year, 1, 1).is_none() {
      return Err(RuleError::Year(year));
    }
    match *self {
      Self::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(RuleError::NoSuchDay { month, day }),
      Self::NthWeekday { month, weekday, ordinal } => {
        nth_weekday(year, month, weekday, ordinal)
      }
      Self::Computed { algorithm } => algorithm.resolve(year),
    }
  }
}

fn check_month(month: u32) -> Result<(), RuleError> {
  if (1..=12).contains(&month) {
    Ok(())
  } else {
    Err(RuleError::Month(month))
  }
}

fn nth_weekday(
  year: i32,
  month: u32,
  weekday: Weekday,
  ordinal: i8,
) -> Result<NaiveDate, RuleError> {
  if ordinal == LAST {
    let first_of_next = if month == 12 {
      year.checked_add(1).and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    } else {
      NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last_day = first_of_next
      .and_then(|d| d.pred_opt())
      .ok_or(RuleError::NoSuchDay { month, day: 1 })?;
    let back = (7 + last_day.weekday().num_days_from_monday()
      - weekday.num_days_from_monday())
      % 7;
    return last_day
      .checked_sub_days(Days::new(u64::from(back)))
      .ok_or(RuleError::Ordinal(ordinal));
  }

  let n = u8::try_from(ordinal).map_err(|_| RuleError::Ordinal(ordinal))?;
  NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
    .ok_or(RuleError::Ordinal(ordinal))
}

// ─── Occasion ────────────────────────────────────────────────────────────────

/// A named recurring calendar event with its message templates.
///
/// `id` is the stable key of the dedup ledger. Changing an occasion's rule
/// must keep its id, otherwise contacts already greeted this year would be
/// greeted again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occasion {
  pub id:               String,
  pub display_name:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:      Option<String>,
  pub rule:             DateRule,
  pub subject_template: String,
  pub body_template:    String,
}

impl Occasion {
  /// The occasion's date in `year`.
  pub fn date_in(&self, year: i32) -> Result<NaiveDate, RuleError> {
    self.rule.resolve(year)
  }
}
