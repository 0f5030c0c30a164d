//! The scan failure taxonomy and its HTTP mapping.
//!
//! These five kinds are the only errors a scanning client ever sees. Response
//! bodies carry the kind's code and nothing else.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Variants are listed in precedence order: when several checks would fail,
/// the earliest one is reported.
#[derive(Debug, Error)]
pub enum ScanError {
  #[error("card_uid, device_code and gateway_code are required")]
  BadRequest,

  #[error("no active card with this uid")]
  CardNotFound,

  #[error("gateway or device is not registered")]
  EndpointNotRegistered,

  #[error("attendance already recorded for this lecture")]
  AlreadyRecorded,

  #[error("attendance could not be recorded: {0}")]
  PersistenceFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ScanError {
  /// The wire code placed in the `error` field of the response body.
  pub fn code(&self) -> &'static str {
    match self {
      Self::BadRequest => "missing_fields",
      Self::CardNotFound => "card_not_found",
      Self::EndpointNotRegistered => "gateway_or_device_not_found",
      Self::AlreadyRecorded => "already_recorded",
      Self::PersistenceFailure(_) => "attendance_recording_failed",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::BadRequest => StatusCode::BAD_REQUEST,
      Self::CardNotFound | Self::EndpointNotRegistered => StatusCode::NOT_FOUND,
      Self::AlreadyRecorded => StatusCode::CONFLICT,
      Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub(crate) fn persistence(
    e: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self::PersistenceFailure(Box::new(e))
  }
}

impl IntoResponse for ScanError {
  fn into_response(self) -> Response {
    if let Self::PersistenceFailure(e) = &self {
      tracing::error!(error = %e, "scan failed in storage");
    }
    (self.status(), Json(json!({ "ok": false, "error": self.code() })))
      .into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn persistence_failure_hides_detail() {
    let err = ScanError::PersistenceFailure("disk I/O error at page 7".into());
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "ok": false, "error": "attendance_recording_failed" }));
  }
}
