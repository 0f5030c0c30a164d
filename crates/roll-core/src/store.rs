//! The `AttendanceStore` trait and supporting query types.
//!
//! Implemented by storage backends (e.g. `roll-store-sqlite`). The scan
//! validator and the admin API depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, InsertOutcome, NewAttendance},
  card::{Card, NewCard, ResolvedCard},
  endpoint::{Device, Gateway, NewDevice, NewGateway},
  lecture::{Lecture, LectureStatus, NewLecture},
  student::{NewStudent, Student},
};

// ─── Error classification ────────────────────────────────────────────────────

/// The broad class of a store failure, as far as callers need to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// A uniqueness rule rejected the write (duplicate code, card uid in use).
  Conflict,
  /// A referenced record does not exist.
  NotFound,
  /// Anything else: I/O, timeouts, corrupt rows.
  Other,
}

pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`AttendanceStore::list_attendance`]. Unset fields do not
/// filter.
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
  pub lecture_id: Option<Uuid>,
  pub student_id: Option<Uuid>,
  pub gateway_id: Option<Uuid>,
  /// Only records scanned at or after this instant.
  pub since:      Option<DateTime<Utc>>,
  pub limit:      Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the attendance database.
///
/// Attendance records are append-only. The only field the scan path ever
/// writes outside the `attendance` table is a device's `last_seen`.
///
/// Implementations must enforce the `(student, lecture)` uniqueness of
/// attendance records themselves and report a violation as
/// [`InsertOutcome::Duplicate`]; callers' pre-checks are not a guarantee.
/// Every call is expected to complete or fail within a bounded time.
///
/// Timestamps are kept at microsecond precision; values returned from a
/// write equal what a later read yields.
pub trait AttendanceStore: Send + Sync {
  type Error: StoreError;

  // ── Provisioning ──────────────────────────────────────────────────────

  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn get_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  /// Bind a new active card to a student. Fails if another active card
  /// already carries the same uid. The uid is stored trimmed, as scans
  /// look it up.
  fn issue_card(
    &self,
    input: NewCard,
  ) -> impl Future<Output = Result<Card, Self::Error>> + Send + '_;

  /// Mark a card inactive. Returns `None` if the card does not exist.
  fn deactivate_card(
    &self,
    card_id: Uuid,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + '_;

  /// Gateway and device codes are stored trimmed.
  fn add_gateway(
    &self,
    input: NewGateway,
  ) -> impl Future<Output = Result<Gateway, Self::Error>> + Send + '_;

  fn add_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  fn list_devices(
    &self,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  fn add_lecture(
    &self,
    input: NewLecture,
  ) -> impl Future<Output = Result<Lecture, Self::Error>> + Send + '_;

  fn get_lecture(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Lecture>, Self::Error>> + Send + '_;

  /// Move a lecture to `status`. Returns `None` if the lecture does not
  /// exist.
  fn set_lecture_status(
    &self,
    id: Uuid,
    status: LectureStatus,
  ) -> impl Future<Output = Result<Option<Lecture>, Self::Error>> + Send + '_;

  // ── Scan-path reads ───────────────────────────────────────────────────

  /// Look up an **active** card by uid together with its owner. Inactive
  /// and unknown uids both yield `None`.
  fn resolve_card<'a>(
    &'a self,
    card_uid: &'a str,
  ) -> impl Future<Output = Result<Option<ResolvedCard>, Self::Error>> + Send + 'a;

  fn find_gateway<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Gateway>, Self::Error>> + Send + 'a;

  fn find_device<'a>(
    &'a self,
    device_code: &'a str,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + 'a;

  /// The existing record for `(student, lecture)`, if any.
  fn find_attendance(
    &self,
    student_id: Uuid,
    lecture_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  // ── Scan-path writes ──────────────────────────────────────────────────

  /// Insert one attendance record. A uniqueness violation on
  /// `(student, lecture)` is reported as [`InsertOutcome::Duplicate`], not
  /// as an error.
  fn record_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Set a device's `last_seen` to `at`.
  fn touch_device(
    &self,
    device_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Listings ──────────────────────────────────────────────────────────

  /// Records matching `query`, newest first.
  fn list_attendance<'a>(
    &'a self,
    query: &'a AttendanceQuery,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;
}
