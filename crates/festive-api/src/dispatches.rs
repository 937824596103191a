//! `GET /dispatches`: read-only view of the dedup ledger.

use axum::{
  Json,
  extract::{Query, State},
};
use festive_core::{ledger::DispatchRecord, transport::MailTransport};
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub occasion_id: Option<String>,
  pub year:        Option<i32>,
}

/// `GET /dispatches[?occasion_id=...][&year=YYYY]`, newest first.
pub async fn list<S, T>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DispatchRecord>>, ApiError>
where
  S: Backend,
  T: MailTransport + 'static,
{
  let records = state
    .store
    .records(params.occasion_id.as_deref(), params.year)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
