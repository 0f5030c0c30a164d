//! Handlers for `/students` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/students` | Body: [`NewStudent`]; returns 201 |
//! | `GET`  | `/students/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roll_core::{
  store::AttendanceStore,
  student::{NewStudent, Student},
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /students`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewStudent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  body.validate()?;
  let student = store.add_student(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(student)))
}

/// `GET /students/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Student>, ApiError>
where
  S: AttendanceStore,
{
  let student = store
    .get_student(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("student {id} not found")))?;
  Ok(Json(student))
}
