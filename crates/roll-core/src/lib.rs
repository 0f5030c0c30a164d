//! Core types and trait definitions for the Roll attendance service.
//!
//! This crate has no HTTP or database dependencies. Every other crate in the
//! workspace depends on it.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures in `store`.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod card;
pub mod endpoint;
pub mod error;
pub mod lecture;
pub mod store;
pub mod student;

pub use error::{Error, Result};
