//! Handlers for `/cards` endpoints.
//!
//! Cards are never deleted; retiring one marks it inactive so it stops
//! resolving at scan time while its attendance history stays intact.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roll_core::{
  card::{Card, NewCard},
  store::AttendanceStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /cards`, body: `{"student_id":"...","card_uid":"..."}`.
///
/// 409 if another active card already carries the uid.
pub async fn issue<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewCard>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  body.validate()?;
  let card = store.issue_card(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(card)))
}

/// `POST /cards/:id/deactivate`
pub async fn deactivate<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Card>, ApiError>
where
  S: AttendanceStore,
{
  let card = store
    .deactivate_card(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("card {id} not found")))?;
  tracing::info!(card_id = %id, "card deactivated");
  Ok(Json(card))
}
