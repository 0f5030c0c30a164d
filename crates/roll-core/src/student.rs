//! Cardholders and the closed set of roles.
//!
//! From the scan path's point of view a student is an opaque reference; the
//! descriptive fields are passed through untouched to the scanning client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Every role a person can hold. Dashboards dispatch on this.
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
pub enum Role {
  Admin,
  Teacher,
  Security,
  Doctor,
  Assistant,
  #[default]
  Student,
}

impl Role {
  pub fn is_staff(self) -> bool { !matches!(self, Self::Student) }
}

/// A person who owns one or more cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:     Uuid,
  /// University-issued matriculation number, distinct from `student_id`.
  pub student_number: String,
  pub first_name:     String,
  pub last_name:      String,
  pub faculty:        String,
  pub department:     String,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  /// Stored elsewhere; only the URL lives here.
  pub photo_url:      Option<String>,
  pub role:           Role,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_student`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudent {
  pub student_number: String,
  pub first_name:     String,
  pub last_name:      String,
  pub faculty:        String,
  pub department:     String,
  #[serde(default)]
  pub email:          Option<String>,
  #[serde(default)]
  pub phone:          Option<String>,
  #[serde(default)]
  pub photo_url:      Option<String>,
  #[serde(default)]
  pub role:           Role,
}

impl NewStudent {
  /// Basic presence checks; anything stricter belongs to the registration UI.
  pub fn validate(&self) -> Result<()> {
    let required = [
      ("student_number", &self.student_number),
      ("first_name", &self.first_name),
      ("last_name", &self.last_name),
      ("faculty", &self.faculty),
      ("department", &self.department),
    ];
    for (name, value) in required {
      if value.trim().is_empty() {
        return Err(Error::EmptyField(name));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn role_parses_from_snake_case() {
    assert_eq!(Role::from_str("security").unwrap(), Role::Security);
    assert_eq!(Role::Assistant.as_ref(), "assistant");
    assert!(Role::from_str("janitor").is_err());
  }

  #[test]
  fn only_student_is_not_staff() {
    assert!(!Role::Student.is_staff());
    assert!(Role::Doctor.is_staff());
    assert!(Role::Admin.is_staff());
  }

  #[test]
  fn validate_rejects_blank_names() {
    let input = NewStudent {
      student_number: "S-100".into(),
      first_name: "  ".into(),
      last_name: "Okafor".into(),
      faculty: "Engineering".into(),
      department: "Computing".into(),
      ..Default::default()
    };
    assert!(matches!(input.validate(), Err(Error::EmptyField("first_name"))));
  }
}
