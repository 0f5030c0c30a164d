//! Scheduled lectures, which scope attendance deduplication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LectureStatus {
  #[default]
  Scheduled,
  Active,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
  pub lecture_id: Uuid,
  pub title:      String,
  /// The classroom the lecture is held in, if assigned.
  pub gateway_id: Option<Uuid>,
  pub start_time: DateTime<Utc>,
  pub end_time:   DateTime<Utc>,
  pub status:     LectureStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLecture {
  pub title:      String,
  #[serde(default)]
  pub gateway_id: Option<Uuid>,
  pub start_time: DateTime<Utc>,
  pub end_time:   DateTime<Utc>,
  #[serde(default)]
  pub status:     LectureStatus,
}

impl NewLecture {
  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::EmptyField("title"));
    }
    if self.end_time < self.start_time {
      return Err(Error::LectureEndsBeforeStart);
    }
    Ok(())
  }
}
