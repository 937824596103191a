//! JSON REST API for the festive greeting dispatcher.
//!
//! Exposes an axum [`Router`] over any store that implements all three
//! collaborator traits, plus a mail transport for the trigger endpoint.
//! TLS and request tracing are the caller's responsibility.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/runs` | [`runs::trigger`] |
//! | `GET`  | `/occasions` | [`occasions::list`] |
//! | `GET`  | `/users/{id}/preferences` | [`preferences::list`] |
//! | `PUT`  | `/users/{id}/preferences/{occasion_id}` | [`preferences::set`] |
//! | `GET`  | `/dispatches` | [`dispatches::list`] |

pub mod auth;
pub mod dispatches;
pub mod error;
pub mod occasions;
pub mod preferences;
pub mod runs;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, post, put},
};
use chrono_tz::Tz;
use festive_core::{
  store::{ContactDirectory, DispatchLedger, PreferenceStore},
  transport::MailTransport,
};
use festive_dispatch::Dispatcher;

pub use auth::AuthConfig;
pub use error::ApiError;

/// A store backing every collaborator role at once.
pub trait Backend: PreferenceStore + ContactDirectory + DispatchLedger + 'static {}

impl<S> Backend for S where S: PreferenceStore + ContactDirectory + DispatchLedger + 'static {}

/// The dispatcher the API drives: one store in all three roles.
pub type AppDispatcher<S, T> = Dispatcher<S, S, S, T>;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, T> {
  pub store:      Arc<S>,
  pub dispatcher: AppDispatcher<S, T>,
  /// Reference zone for "today" when a run has no date override.
  pub time_zone:  Tz,
  pub auth:       Option<Arc<AuthConfig>>,
}

impl<S, T> Clone for AppState<S, T> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      dispatcher: self.dispatcher.clone(),
      time_zone:  self.time_zone,
      auth:       self.auth.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router. Every route requires Basic auth when `state.auth`
/// is set.
pub fn router<S, T>(state: AppState<S, T>) -> Router
where
  S: Backend,
  T: MailTransport + 'static,
{
  let auth = state.auth.clone();
  let router = Router::new()
    .route("/runs", post(runs::trigger::<S, T>))
    .route("/occasions", get(occasions::list::<S, T>))
    .route("/users/{id}/preferences", get(preferences::list::<S, T>))
    .route("/users/{id}/preferences/{occasion_id}", put(preferences::set::<S, T>))
    .route("/dispatches", get(dispatches::list::<S, T>))
    .with_state(state);

  match auth {
    Some(config) => router.layer(middleware::from_fn_with_state(config, auth::require_auth)),
    None => router,
  }
}
