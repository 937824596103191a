//! `GET /occasions`: the registry with each occasion's date for a year.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{Datelike as _, NaiveDate};
use festive_core::{occasion::Occasion, target::today_in, transport::MailTransport};
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Defaults to the current year in the reference zone.
  pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct OccasionEntry {
  #[serde(flatten)]
  pub occasion: Occasion,
  pub date:     NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct OccasionListing {
  pub calendar_version: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label:            Option<String>,
  pub year:             i32,
  pub occasions:        Vec<OccasionEntry>,
}

/// `GET /occasions[?year=YYYY]`
pub async fn list<S, T>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<ListParams>,
) -> Result<Json<OccasionListing>, ApiError>
where
  S: Backend,
  T: MailTransport + 'static,
{
  let calendar = state.dispatcher.calendar();
  let year = params
    .year
    .unwrap_or_else(|| today_in(&state.time_zone).year());

  let occasions = calendar
    .resolve_year(year)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?
    .into_iter()
    .map(|resolved| OccasionEntry {
      occasion: resolved.occasion.clone(),
      date:     resolved.date,
    })
    .collect();

  Ok(Json(OccasionListing {
    calendar_version: calendar.version().to_owned(),
    label: calendar.label().map(str::to_owned),
    year,
    occasions,
  }))
}
