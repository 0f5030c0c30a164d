//! Attendance records and the status rule applied when one is created.
//!
//! A record is written exactly once per successful scan and never changes
//! afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
  Present,
  Late,
  /// Never produced by a scan.
  Excused,
}

impl AttendanceStatus {
  /// The status a scan at `scanned_at` earns.
  ///
  /// Gate scans (`lecture_start == None`) are always `Present`. A lecture
  /// scan is `Late` only when strictly after `lecture_start + late_after`.
  pub fn for_scan(
    scanned_at: DateTime<Utc>,
    lecture_start: Option<DateTime<Utc>>,
    late_after: Duration,
  ) -> Self {
    match lecture_start {
      Some(start) if scanned_at > start + late_after => Self::Late,
      _ => Self::Present,
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub attendance_id: Uuid,
  pub student_id:    Uuid,
  pub card_id:       Uuid,
  /// `None` for gate scans.
  pub lecture_id:    Option<Uuid>,
  pub gateway_id:    Uuid,
  pub device_id:     Uuid,
  pub scanned_at:    DateTime<Utc>,
  pub status:        AttendanceStatus,
  pub note:          Option<String>,
}

/// Input to [`crate::store::AttendanceStore::record_attendance`].
///
/// `scanned_at` is assigned by the server when the scan is validated; it is
/// never taken from the client.
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub student_id: Uuid,
  pub card_id:    Uuid,
  pub lecture_id: Option<Uuid>,
  pub gateway_id: Uuid,
  pub device_id:  Uuid,
  pub scanned_at: DateTime<Utc>,
  pub status:     AttendanceStatus,
  pub note:       Option<String>,
}

/// Result of an insert attempt. `Duplicate` means the store refused the row
/// because a record for the same `(student, lecture)` already exists.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
  Inserted(AttendanceRecord),
  Duplicate,
}
