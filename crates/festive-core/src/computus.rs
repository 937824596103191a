//! Calendrical algorithms behind [`ComputedAlgorithm`](crate::occasion::ComputedAlgorithm).
//!
//! Everything here is a pure function of the year. Easter dates are computed
//! arithmetically. The lunisolar new year is looked up in a table of
//! published dates, because an astronomical new-moon computation is far
//! heavier than the handful of years a deployment actually needs. Years
//! outside the table return `None`.

use chrono::{Days, NaiveDate};

/// First year of the Gregorian calendar; the computus is meaningless before.
const FIRST_GREGORIAN_YEAR: i32 = 1583;

/// Gregorian Easter Sunday (the "anonymous Gregorian algorithm").
pub fn western_easter(year: i32) -> Option<NaiveDate> {
  if year < FIRST_GREGORIAN_YEAR {
    return None;
  }
  let a = year % 19;
  let b = year / 100;
  let c = year % 100;
  let d = b / 4;
  let e = b % 4;
  let f = (b + 8) / 25;
  let g = (b - f + 1) / 3;
  let h = (19 * a + b - d - g + 15) % 30;
  let i = c / 4;
  let k = c % 4;
  let l = (32 + 2 * e + 2 * i - h - k) % 7;
  let m = (a + 11 * h + 22 * l) / 451;
  let month = (h + l - 7 * m + 114) / 31;
  let day = (h + l - 7 * m + 114) % 31 + 1;
  NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Orthodox Easter Sunday, expressed in the Gregorian calendar.
///
/// The Julian computus yields a Julian-calendar date; the Julian/Gregorian
/// gap is `year / 100 - year / 400 - 2` days for any date between March and
/// the end of the year.
pub fn orthodox_easter(year: i32) -> Option<NaiveDate> {
  if year < FIRST_GREGORIAN_YEAR {
    return None;
  }
  let a = year % 4;
  let b = year % 7;
  let c = year % 19;
  let d = (19 * c + 15) % 30;
  let e = (2 * a + 4 * b - d + 34) % 7;
  let month = (d + e + 114) / 31;
  let day = (d + e + 114) % 31 + 1;

  // Julian March/April dates never overflow into May before the shift, so
  // build the day count from March 1st to stay valid for day 31 in April.
  let march_first = NaiveDate::from_ymd_opt(year, 3, 1)?;
  let offset_in_julian = if month == 3 { day - 1 } else { 31 + day - 1 };
  let gap = year / 100 - year / 400 - 2;
  march_first.checked_add_days(Days::new((offset_in_julian + gap) as u64))
}

/// Published Chinese New Year dates, `(year, month, day)`.
const LUNAR_NEW_YEAR: &[(i32, u32, u32)] = &[
  (2020, 1, 25),
  (2021, 2, 12),
  (2022, 2, 1),
  (2023, 1, 22),
  (2024, 2, 10),
  (2025, 1, 29),
  (2026, 2, 17),
  (2027, 2, 6),
  (2028, 1, 26),
  (2029, 2, 13),
  (2030, 2, 3),
  (2031, 1, 23),
  (2032, 2, 11),
  (2033, 1, 31),
  (2034, 2, 19),
  (2035, 2, 8),
  (2036, 1, 28),
  (2037, 2, 15),
  (2038, 2, 4),
  (2039, 1, 24),
  (2040, 2, 12),
];

/// First day of the Chinese lunisolar year, if `year` is covered.
pub fn lunar_new_year(year: i32) -> Option<NaiveDate> {
  LUNAR_NEW_YEAR
    .iter()
    .find(|(y, _, _)| *y == year)
    .and_then(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

/// The inclusive range of years [`lunar_new_year`] can answer for.
pub fn lunar_new_year_coverage() -> (i32, i32) {
  let first = LUNAR_NEW_YEAR.first().map_or(0, |e| e.0);
  let last = LUNAR_NEW_YEAR.last().map_or(0, |e| e.0);
  (first, last)
}
