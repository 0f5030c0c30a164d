//! Error type for `roll-store-sqlite`.

use std::{os::raw::c_int, time::Duration};

use roll_core::store::{StoreError, StoreErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown stored enum value: {0}")]
  UnknownVariant(#[from] strum::ParseError),

  #[error("database call exceeded {0:?}")]
  Timeout(Duration),

  #[error("student not found: {0}")]
  StudentNotFound(uuid::Uuid),

  #[error("device not found: {0}")]
  DeviceNotFound(uuid::Uuid),

  #[error("an active card already carries uid {0:?}")]
  CardUidInUse(String),

  #[error("code already registered: {0:?}")]
  DuplicateCode(String),
}

impl Error {
  /// The SQLite extended result code if this is a constraint violation.
  pub fn constraint(&self) -> Option<c_int> {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => constraint_of(e),
      _ => None,
    }
  }
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::CardUidInUse(_) | Self::DuplicateCode(_) => StoreErrorKind::Conflict,
      Self::StudentNotFound(_) | Self::DeviceNotFound(_) => StoreErrorKind::NotFound,
      _ => StoreErrorKind::Other,
    }
  }
}

pub(crate) fn constraint_of(e: &rusqlite::Error) -> Option<c_int> {
  match e {
    rusqlite::Error::SqliteFailure(f, _)
      if f.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      Some(f.extended_code)
    }
    _ => None,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
