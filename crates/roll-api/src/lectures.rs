//! Handlers for `/lectures` endpoints.
//!
//! A lecture is created `scheduled` (or with an explicit status), opened
//! with `start` and closed with `end`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roll_core::{
  lecture::{Lecture, LectureStatus, NewLecture},
  store::AttendanceStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /lectures`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewLecture>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  body.validate()?;
  let lecture = store.add_lecture(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(lecture)))
}

/// `GET /lectures/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Lecture>, ApiError>
where
  S: AttendanceStore,
{
  let lecture = store
    .get_lecture(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("lecture {id} not found")))?;
  Ok(Json(lecture))
}

/// `POST /lectures/:id/start`
pub async fn start<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Lecture>, ApiError>
where
  S: AttendanceStore,
{
  transition(&*store, id, LectureStatus::Active).await
}

/// `POST /lectures/:id/end`
pub async fn end<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Lecture>, ApiError>
where
  S: AttendanceStore,
{
  transition(&*store, id, LectureStatus::Completed).await
}

async fn transition<S>(
  store: &S,
  id: Uuid,
  status: LectureStatus,
) -> Result<Json<Lecture>, ApiError>
where
  S: AttendanceStore,
{
  let lecture = store
    .set_lecture_status(id, status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("lecture {id} not found")))?;
  tracing::info!(lecture_id = %id, status = status.as_ref(), "lecture status changed");
  Ok(Json(lecture))
}
