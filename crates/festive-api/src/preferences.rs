//! Per-user occasion toggles.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/{id}/preferences` | One entry per registry occasion; unset means disabled |
//! | `PUT`  | `/users/{id}/preferences/{occasion_id}` | Body: `{"enabled": bool}` |

use std::collections::HashMap;

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use festive_core::transport::MailTransport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Serialize)]
pub struct PreferenceEntry {
  pub occasion_id:  String,
  pub display_name: String,
  pub enabled:      bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at:   Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SetBody {
  pub enabled: bool,
}

async fn ensure_user<S: Backend>(store: &S, user_id: Uuid) -> Result<(), ApiError> {
  match store.profile(user_id).await.map_err(ApiError::store)? {
    Some(_) => Ok(()),
    None => Err(ApiError::NotFound(format!("user {user_id}"))),
  }
}

/// `GET /users/{id}/preferences`
pub async fn list<S, T>(
  State(state): State<AppState<S, T>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PreferenceEntry>>, ApiError>
where
  S: Backend,
  T: MailTransport + 'static,
{
  ensure_user(&*state.store, user_id).await?;
  let stored: HashMap<String, _> = state
    .store
    .preferences(user_id)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|p| (p.occasion_id.clone(), p))
    .collect();

  let entries = state
    .dispatcher
    .calendar()
    .occasions()
    .iter()
    .map(|occasion| {
      let pref = stored.get(&occasion.id);
      PreferenceEntry {
        occasion_id:  occasion.id.clone(),
        display_name: occasion.display_name.clone(),
        enabled:      pref.is_some_and(|p| p.enabled),
        updated_at:   pref.map(|p| p.updated_at),
      }
    })
    .collect();
  Ok(Json(entries))
}

/// `PUT /users/{id}/preferences/{occasion_id}`
pub async fn set<S, T>(
  State(state): State<AppState<S, T>>,
  Path((user_id, occasion_id)): Path<(Uuid, String)>,
  Json(body): Json<SetBody>,
) -> Result<Json<PreferenceEntry>, ApiError>
where
  S: Backend,
  T: MailTransport + 'static,
{
  let Some(occasion) = state.dispatcher.calendar().get(&occasion_id) else {
    return Err(ApiError::NotFound(format!("occasion {occasion_id:?}")));
  };
  let display_name = occasion.display_name.clone();
  ensure_user(&*state.store, user_id).await?;

  let pref = state
    .store
    .set_preference(user_id, &occasion_id, body.enabled)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user = %user_id, occasion = %occasion_id, enabled = pref.enabled, "preference updated");

  Ok(Json(PreferenceEntry {
    occasion_id: pref.occasion_id,
    display_name,
    enabled: pref.enabled,
    updated_at: Some(pref.updated_at),
  }))
}
