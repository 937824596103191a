//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use festive_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The occasion calendar cannot serve the request.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// A collaborator is down; retrying later may succeed.
  #[error("service unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Classify a collaborator error: systemic failures become 503.
  pub fn store<E: StoreError>(e: E) -> Self {
    if e.is_systemic() {
      Self::Unavailable(e.to_string())
    } else {
      Self::Store(Box::new(e))
    }
  }
}

impl From<festive_dispatch::Error> for ApiError {
  fn from(e: festive_dispatch::Error) -> Self {
    match e {
      festive_dispatch::Error::Configuration { .. } => Self::Configuration(e.to_string()),
      festive_dispatch::Error::Discovery { .. } => Self::Unavailable(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Configuration(_) | ApiError::Store(_) | ApiError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"festive\""),
      );
    }
    res
  }
}
