//! HTTP Basic auth for the admin API.
//!
//! The scan endpoint is not covered: scanners identify
//! themselves by device code, not by credentials.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

/// Credentials accepted for the admin API.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Rejection for missing or wrong credentials.
#[derive(Debug)]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
  fn into_response(self) -> Response {
    let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"roll\""),
    );
    res
  }
}

/// Verify credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Unauthorized> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Unauthorized)?;

  if username != config.username {
    return Err(Unauthorized);
  }

  let parsed_hash =
    PasswordHash::new(&config.password_hash).map_err(|_| Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Unauthorized)?;

  Ok(())
}

/// Middleware guarding every route it wraps.
pub async fn require_auth(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Response {
  match verify_auth(req.headers(), &config) {
    Ok(()) => next.run(req).await,
    Err(e) => {
      tracing::debug!(path = %req.uri().path(), "rejected admin request");
      e.into_response()
    }
  }
}
