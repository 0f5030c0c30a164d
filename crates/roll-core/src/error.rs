//! Error types for `roll-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("required field is empty: {0}")]
  EmptyField(&'static str),

  #[error("lecture ends before it starts")]
  LectureEndsBeforeStart,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
