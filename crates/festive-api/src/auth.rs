//! Optional HTTP Basic auth guarding every route.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;

use crate::ApiError;

/// Credentials accepted by this server instance.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$...`
  pub password_hash: String,
}

/// Verify the `Authorization` header against `config`.
///
/// The password hash is checked even when the username is wrong, so every
/// rejected pair costs one argon2 verification and fails the same way.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let (username, password) = basic_credentials(headers).ok_or(ApiError::Unauthorized)?;
  let hash = PasswordHash::new(&config.password_hash).map_err(|_| ApiError::Unauthorized)?;

  let password_ok = Argon2::default()
    .verify_password(password.as_bytes(), &hash)
    .is_ok();
  let username_ok = same_bytes(username.as_bytes(), config.username.as_bytes());

  if password_ok & username_ok {
    Ok(())
  } else {
    Err(ApiError::Unauthorized)
  }
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let encoded = headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Basic ")?;
  let decoded = String::from_utf8(B64.decode(encoded).ok()?).ok()?;
  let (username, password) = decoded.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Byte comparison whose running time depends only on the lengths.
fn same_bytes(a: &[u8], b: &[u8]) -> bool {
  a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware rejecting requests without valid credentials.
pub async fn require_auth(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  verify_auth(req.headers(), &config)?;
  Ok(next.run(req).await)
}
