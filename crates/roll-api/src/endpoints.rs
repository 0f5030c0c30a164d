//! Handlers for gateway and device registration.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use roll_core::{
  endpoint::{Device, NewDevice, NewGateway},
  store::AttendanceStore,
};

use crate::error::ApiError;

/// `POST /gateways`
pub async fn create_gateway<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewGateway>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  body.validate()?;
  let gateway = store.add_gateway(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(gateway)))
}

/// `POST /devices`
pub async fn create_device<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewDevice>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  body.validate()?;
  let device = store.add_device(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(device)))
}

/// `GET /devices`: every registered device with its `last_seen` stamp.
pub async fn list_devices<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Device>>, ApiError>
where
  S: AttendanceStore,
{
  let devices = store.list_devices().await.map_err(ApiError::store)?;
  Ok(Json(devices))
}
