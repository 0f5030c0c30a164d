//! HTTP surface of the Roll attendance service.
//!
//! Exposes an axum [`Router`] with the card-scan endpoint and, when admin
//! credentials are configured, the provisioning API from `roll-api`, backed
//! by any [`AttendanceStore`].

pub mod auth;
pub mod error;
pub mod liveness;
pub mod validator;

pub use error::ScanError;
pub use validator::{ScanReceipt, ScanRequest, ScanValidator};

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Json, Router,
  body::Body,
  extract::{Request, State},
  http::{
    Method, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
  },
  middleware,
  response::{IntoResponse, Response},
  routing::{any, get},
};
use bytes::Bytes;
use roll_core::store::AttendanceStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use auth::{AuthConfig, require_auth};

/// Largest scan body accepted; real payloads are a few hundred bytes.
const MAX_SCAN_BODY: usize = 64 * 1024;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLL_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Minutes after a lecture starts before a scan counts as late.
  pub late_after_minutes: i64,
  /// Upper bound on each database call.
  pub store_timeout_ms:   u64,
  /// Admin API credentials. The API is not mounted unless both are set.
  pub auth_username:      Option<String>,
  pub auth_password_hash: Option<String>,
}

impl ServerConfig {
  pub fn late_after(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.late_after_minutes)
  }

  pub fn store_timeout(&self) -> Duration { Duration::from_millis(self.store_timeout_ms) }

  pub fn auth(&self) -> Option<AuthConfig> {
    match (&self.auth_username, &self.auth_password_hash) {
      (Some(username), Some(password_hash)) => Some(AuthConfig {
        username:      username.clone(),
        password_hash: password_hash.clone(),
      }),
      _ => None,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers. Holds nothing mutable.
#[derive(Clone)]
pub struct AppState<S: AttendanceStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Option<Arc<AuthConfig>>,
}

impl<S: AttendanceStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let auth = config.auth().map(Arc::new);
    Self { store: Arc::new(store), config: Arc::new(config), auth }
  }

  fn validator(&self) -> ScanValidator<S> {
    ScanValidator::new(Arc::clone(&self.store), self.config.late_after())
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the service router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AttendanceStore + Clone + Send + Sync + 'static,
{
  let admin = state.auth.clone().map(|auth| {
    roll_api::api_router(Arc::clone(&state.store))
      .layer(middleware::from_fn_with_state(auth, require_auth))
  });

  let mut app = Router::new()
    .route("/scan", any(scan_handler::<S>))
    .route("/health", get(|| async { "ok" }))
    .with_state(state);

  if let Some(admin) = admin {
    app = app.nest("/api", admin);
  }

  app.layer(cors()).layer(TraceLayer::new_for_http())
}

/// Scanning clients run in browsers on arbitrary origins.
fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([CONTENT_TYPE, AUTHORIZATION])
    .max_age(Duration::from_secs(60 * 60))
}

// ─── Scan endpoint ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ScanResponse {
  ok:      bool,
  #[serde(flatten)]
  receipt: ScanReceipt,
}

async fn scan_handler<S>(State(state): State<AppState<S>>, req: Request<Body>) -> Response
where
  S: AttendanceStore + Clone + Send + Sync + 'static,
{
  let method = req.method().clone();
  match method.as_str() {
    "OPTIONS" => StatusCode::OK.into_response(),
    "POST" => {
      let result = match collect_scan(req).await {
        Ok(scan) => state.validator().scan(&scan).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(receipt) => Json(ScanResponse { ok: true, receipt }).into_response(),
        Err(e) => {
          tracing::debug!(error = e.code(), "scan rejected");
          e.into_response()
        }
      }
    }
    _ => (
      StatusCode::METHOD_NOT_ALLOWED,
      Json(json!({ "ok": false, "error": "method_not_allowed" })),
    )
      .into_response(),
  }
}

/// Read and parse the body. Anything that is not a JSON object with the
/// expected fields counts as missing fields.
async fn collect_scan(req: Request<Body>) -> Result<ScanRequest, ScanError> {
  let body: Bytes = axum::body::to_bytes(req.into_body(), MAX_SCAN_BODY)
    .await
    .map_err(|_| ScanError::BadRequest)?;
  serde_json::from_slice(&body).map_err(|_| ScanError::BadRequest)
}

// ─── Integration tests ────────────────────────────────────────────────────────
