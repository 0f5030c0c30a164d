//! Physical NFC cards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, student::Student};

/// A card bound to a student. Only active cards resolve during a scan; at
/// most one active card may carry a given `card_uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
  pub card_id:    Uuid,
  /// The token value read off the card, e.g. `NFC001234567890`.
  pub card_uid:   String,
  pub student_id: Uuid,
  pub is_active:  bool,
  pub issued_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::issue_card`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
  pub student_id: Uuid,
  pub card_uid:   String,
}

impl NewCard {
  pub fn validate(&self) -> Result<()> {
    if self.card_uid.trim().is_empty() {
      return Err(Error::EmptyField("card_uid"));
    }
    Ok(())
  }
}

/// An active card together with its owner.
#[derive(Debug, Clone)]
pub struct ResolvedCard {
  pub card:    Card,
  pub student: Student,
}
