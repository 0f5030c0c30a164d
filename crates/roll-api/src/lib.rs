//! JSON provisioning and read API for Roll.
//!
//! Exposes an axum [`Router`] backed by any [`roll_core::store::AttendanceStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roll_api::api_router(store.clone()))
//! ```

pub mod attendance;
pub mod cards;
pub mod endpoints;
pub mod error;
pub mod lectures;
pub mod students;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use roll_core::store::AttendanceStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router that has
/// already been given its state.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AttendanceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Cardholders and cards
    .route("/students", post(students::create::<S>))
    .route("/students/{id}", get(students::get_one::<S>))
    .route("/cards", post(cards::issue::<S>))
    .route("/cards/{id}/deactivate", post(cards::deactivate::<S>))
    // Physical endpoints
    .route("/gateways", post(endpoints::create_gateway::<S>))
    .route(
      "/devices",
      get(endpoints::list_devices::<S>).post(endpoints::create_device::<S>),
    )
    // Lectures
    .route("/lectures", post(lectures::create::<S>))
    .route("/lectures/{id}", get(lectures::get_one::<S>))
    .route("/lectures/{id}/start", post(lectures::start::<S>))
    .route("/lectures/{id}/end", post(lectures::end::<S>))
    // Attendance log
    .route("/attendance", get(attendance::list::<S>))
    .with_state(store)
}
