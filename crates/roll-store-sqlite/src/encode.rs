//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision, so lexical order matches chronological order. Enums are stored
//! as their snake_case names. UUIDs are stored as hyphenated lowercase
//! strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use roll_core::{
  attendance::AttendanceRecord,
  card::Card,
  endpoint::{Device, Gateway},
  lecture::Lecture,
  student::Student,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Parse a snake_case enum column written with `AsRef<str>`.
pub fn decode_enum<T>(s: &str) -> Result<T>
where
  T: FromStr<Err = strum::ParseError>,
{
  Ok(T::from_str(s)?)
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const STUDENT_COLUMNS: &str = "s.student_id, s.student_number, s.first_name, \
  s.last_name, s.faculty, s.department, s.email, s.phone, s.photo_url, s.role, \
  s.created_at";

pub const CARD_COLUMNS: &str =
  "c.card_id, c.card_uid, c.student_id, c.is_active, c.issued_at";

pub const GATEWAY_COLUMNS: &str =
  "g.gateway_id, g.code, g.display_name, g.location, g.kind";

pub const DEVICE_COLUMNS: &str =
  "d.device_id, d.device_code, d.device_name, d.kind, d.is_active, d.last_seen";

pub const LECTURE_COLUMNS: &str =
  "l.lecture_id, l.title, l.gateway_id, l.start_time, l.end_time, l.status";

pub const ATTENDANCE_COLUMNS: &str = "a.attendance_id, a.student_id, a.card_id, \
  a.lecture_id, a.gateway_id, a.device_id, a.scanned_at, a.status, a.note";

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `Raw*` holds the column values exactly as read inside a
// `Connection::call` closure. Decoding happens afterwards, outside the
// database thread. `at` is the index of the first column in the row, so the
// same type can read one half of a join.

/// Raw strings read from a `students` row.
pub struct RawStudent {
  pub student_id:     String,
  pub student_number: String,
  pub first_name:     String,
  pub last_name:      String,
  pub faculty:        String,
  pub department:     String,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub photo_url:      Option<String>,
  pub role:           String,
  pub created_at:     String,
}

impl RawStudent {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:     row.get(at)?,
      student_number: row.get(at + 1)?,
      first_name:     row.get(at + 2)?,
      last_name:      row.get(at + 3)?,
      faculty:        row.get(at + 4)?,
      department:     row.get(at + 5)?,
      email:          row.get(at + 6)?,
      phone:          row.get(at + 7)?,
      photo_url:      row.get(at + 8)?,
      role:           row.get(at + 9)?,
      created_at:     row.get(at + 10)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:     decode_uuid(&self.student_id)?,
      student_number: self.student_number,
      first_name:     self.first_name,
      last_name:      self.last_name,
      faculty:        self.faculty,
      department:     self.department,
      email:          self.email,
      phone:          self.phone,
      photo_url:      self.photo_url,
      role:           decode_enum(&self.role)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `cards` row.
pub struct RawCard {
  pub card_id:    String,
  pub card_uid:   String,
  pub student_id: String,
  pub is_active:  bool,
  pub issued_at:  String,
}

impl RawCard {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      card_id:    row.get(at)?,
      card_uid:   row.get(at + 1)?,
      student_id: row.get(at + 2)?,
      is_active:  row.get(at + 3)?,
      issued_at:  row.get(at + 4)?,
    })
  }

  pub fn into_card(self) -> Result<Card> {
    Ok(Card {
      card_id:    decode_uuid(&self.card_id)?,
      card_uid:   self.card_uid,
      student_id: decode_uuid(&self.student_id)?,
      is_active:  self.is_active,
      issued_at:  decode_dt(&self.issued_at)?,
    })
  }
}

/// Raw strings read from a `gateways` row.
pub struct RawGateway {
  pub gateway_id:   String,
  pub code:         String,
  pub display_name: String,
  pub location:     String,
  pub kind:         String,
}

impl RawGateway {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      gateway_id:   row.get(at)?,
      code:         row.get(at + 1)?,
      display_name: row.get(at + 2)?,
      location:     row.get(at + 3)?,
      kind:         row.get(at + 4)?,
    })
  }

  pub fn into_gateway(self) -> Result<Gateway> {
    Ok(Gateway {
      gateway_id:   decode_uuid(&self.gateway_id)?,
      code:         self.code,
      display_name: self.display_name,
      location:     self.location,
      kind:         decode_enum(&self.kind)?,
    })
  }
}

/// Raw values read from a `devices` row.
pub struct RawDevice {
  pub device_id:   String,
  pub device_code: String,
  pub device_name: String,
  pub kind:        String,
  pub is_active:   bool,
  pub last_seen:   Option<String>,
}

impl RawDevice {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      device_id:   row.get(at)?,
      device_code: row.get(at + 1)?,
      device_name: row.get(at + 2)?,
      kind:        row.get(at + 3)?,
      is_active:   row.get(at + 4)?,
      last_seen:   row.get(at + 5)?,
    })
  }

  pub fn into_device(self) -> Result<Device> {
    Ok(Device {
      device_id:   decode_uuid(&self.device_id)?,
      device_code: self.device_code,
      device_name: self.device_name,
      kind:        decode_enum(&self.kind)?,
      is_active:   self.is_active,
      last_seen:   decode_opt_dt(self.last_seen)?,
    })
  }
}

/// Raw strings read from a `lectures` row.
pub struct RawLecture {
  pub lecture_id: String,
  pub title:      String,
  pub gateway_id: Option<String>,
  pub start_time: String,
  pub end_time:   String,
  pub status:     String,
}

impl RawLecture {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      lecture_id: row.get(at)?,
      title:      row.get(at + 1)?,
      gateway_id: row.get(at + 2)?,
      start_time: row.get(at + 3)?,
      end_time:   row.get(at + 4)?,
      status:     row.get(at + 5)?,
    })
  }

  pub fn into_lecture(self) -> Result<Lecture> {
    Ok(Lecture {
      lecture_id: decode_uuid(&self.lecture_id)?,
      title:      self.title,
      gateway_id: decode_opt_uuid(self.gateway_id)?,
      start_time: decode_dt(&self.start_time)?,
      end_time:   decode_dt(&self.end_time)?,
      status:     decode_enum(&self.status)?,
    })
  }
}

/// Raw strings read from an `attendance` row.
pub struct RawAttendance {
  pub attendance_id: String,
  pub student_id:    String,
  pub card_id:       String,
  pub lecture_id:    Option<String>,
  pub gateway_id:    String,
  pub device_id:     String,
  pub scanned_at:    String,
  pub status:        String,
  pub note:          Option<String>,
}

impl RawAttendance {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      attendance_id: row.get(at)?,
      student_id:    row.get(at + 1)?,
      card_id:       row.get(at + 2)?,
      lecture_id:    row.get(at + 3)?,
      gateway_id:    row.get(at + 4)?,
      device_id:     row.get(at + 5)?,
      scanned_at:    row.get(at + 6)?,
      status:        row.get(at + 7)?,
      note:          row.get(at + 8)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      attendance_id: decode_uuid(&self.attendance_id)?,
      student_id:    decode_uuid(&self.student_id)?,
      card_id:       decode_uuid(&self.card_id)?,
      lecture_id:    decode_opt_uuid(self.lecture_id)?,
      gateway_id:    decode_uuid(&self.gateway_id)?,
      device_id:     decode_uuid(&self.device_id)?,
      scanned_at:    decode_dt(&self.scanned_at)?,
      status:        decode_enum(&self.status)?,
      note:          self.note,
    })
  }
}
