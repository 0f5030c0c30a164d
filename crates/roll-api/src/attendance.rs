//! Handler for `GET /attendance`.
//!
//! Query params map directly to [`AttendanceQuery`] fields. Results are
//! newest first; `limit` defaults to 100.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use roll_core::{
  attendance::AttendanceRecord,
  store::{AttendanceQuery, AttendanceStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Hard ceiling on `limit`.
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub lecture_id: Option<Uuid>,
  pub student_id: Option<Uuid>,
  pub gateway_id: Option<Uuid>,
  pub since:      Option<DateTime<Utc>>,
  pub limit:      Option<usize>,
}

/// `GET /attendance[?lecture_id=...][&student_id=...][&gateway_id=...][&since=...][&limit=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: AttendanceStore,
{
  let query = AttendanceQuery {
    lecture_id: params.lecture_id,
    student_id: params.student_id,
    gateway_id: params.gateway_id,
    since:      params.since,
    limit:      params.limit.map(|l| l.min(MAX_LIMIT)),
  };

  let records = store
    .list_attendance(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
