//! `POST /runs`: trigger one dispatch run.

use axum::{
  Json,
  extract::{Query, State},
};
use festive_core::{
  stats::RunStats,
  target::{resolve_target, today_in},
  transport::MailTransport,
};
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RunParams {
  /// `MM-DD` or `YYYY-MM-DD`. Defaults to today in the reference zone.
  pub date:    Option<String>,
  #[serde(default)]
  pub dry_run: bool,
}

/// `POST /runs[?date=MM-DD][&dry_run=true]`
///
/// Returns the run's stats even when individual sends failed. Only an invalid
/// date (400), an unusable calendar (500), or a systemic lookup failure (503)
/// produce an error response.
pub async fn trigger<S, T>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<RunParams>,
) -> Result<Json<RunStats>, ApiError>
where
  S: Backend,
  T: MailTransport + 'static,
{
  let today = today_in(&state.time_zone);
  let target = resolve_target(params.date.as_deref(), today)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  // A detached task keeps the run going if the client disconnects, so
  // in-flight sends are never cut off mid-reservation.
  let dispatcher = state.dispatcher.clone();
  let run = tokio::spawn(async move { dispatcher.run(target, params.dry_run).await });
  let stats = run
    .await
    .map_err(|e| ApiError::Internal(format!("dispatch task failed: {e}")))??;

  Ok(Json(stats))
}
