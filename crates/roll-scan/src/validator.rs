//! The scan validator: turns one card tap into at most one attendance record.
//!
//! Steps run in a fixed order and stop at the first failure:
//!
//! 1. request shape (no lookups before this passes)
//! 2. card resolution, concurrently with
//! 3. gateway and device resolution
//! 4. duplicate pre-check for lecture scans
//! 5. status computation
//! 6. insert, where the store's uniqueness constraint has the final word
//! 7. device liveness stamp (never fails the scan)

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use roll_core::{
  attendance::{AttendanceStatus, InsertOutcome, NewAttendance},
  endpoint::{Device, Gateway},
  store::AttendanceStore,
  student::Student,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ScanError, liveness};

// ─── Request / receipt ───────────────────────────────────────────────────────

/// The body a scanning client posts. Every field is optional at the
/// deserialisation layer so that missing fields are reported as
/// [`ScanError::BadRequest`] rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
  #[serde(default)]
  pub card_uid:     Option<String>,
  #[serde(default)]
  pub device_code:  Option<String>,
  #[serde(default)]
  pub gateway_code: Option<String>,
  #[serde(default)]
  pub lecture_id:   Option<String>,
}

impl ScanRequest {
  pub fn gate(card_uid: &str, device_code: &str, gateway_code: &str) -> Self {
    Self {
      card_uid:     Some(card_uid.to_owned()),
      device_code:  Some(device_code.to_owned()),
      gateway_code: Some(gateway_code.to_owned()),
      lecture_id:   None,
    }
  }

  pub fn with_lecture(mut self, lecture_id: impl ToString) -> Self {
    self.lecture_id = Some(lecture_id.to_string());
    self
  }

  fn validate(&self) -> Result<ValidScan<'_>, ScanError> {
    fn required(v: &Option<String>) -> Result<&str, ScanError> {
      v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ScanError::BadRequest)
    }

    Ok(ValidScan {
      card_uid:     required(&self.card_uid)?,
      device_code:  required(&self.device_code)?,
      gateway_code: required(&self.gateway_code)?,
      lecture_id:   self
        .lecture_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty()),
    })
  }
}

struct ValidScan<'a> {
  card_uid:     &'a str,
  device_code:  &'a str,
  gateway_code: &'a str,
  lecture_id:   Option<&'a str>,
}

/// What a successful scan returns. The only place cardholder details leave
/// the validator.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReceipt {
  pub student:       Student,
  pub attendance_id: Uuid,
  pub status:        AttendanceStatus,
  pub scanned_at:    DateTime<Utc>,
}

// ─── Validator ───────────────────────────────────────────────────────────────

pub struct ScanValidator<S> {
  store:      Arc<S>,
  late_after: Duration,
}

impl<S> Clone for ScanValidator<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), late_after: self.late_after }
  }
}

impl<S> ScanValidator<S>
where
  S: AttendanceStore,
{
  /// `late_after` is how long after a lecture's start a scan still counts
  /// as `present`.
  pub fn new(store: Arc<S>, late_after: Duration) -> Self {
    Self { store, late_after }
  }

  /// Validate and record a scan stamped with the current time.
  pub async fn scan(&self, req: &ScanRequest) -> Result<ScanReceipt, ScanError> {
    self.scan_at(req, Utc::now()).await
  }

  /// Validate and record a scan stamped with `now`, truncated to the
  /// microsecond precision the store keeps.
  pub async fn scan_at(
    &self,
    req: &ScanRequest,
    now: DateTime<Utc>,
  ) -> Result<ScanReceipt, ScanError> {
    let now = now.trunc_subsecs(6);
    let scan = req.validate()?;
    let store = &*self.store;

    let (card, endpoint) = tokio::join!(
      store.resolve_card(scan.card_uid),
      resolve_endpoint(store, scan.gateway_code, scan.device_code),
    );

    let resolved = card
      .map_err(ScanError::persistence)?
      .ok_or(ScanError::CardNotFound)?;
    let (gateway, device) = endpoint?;

    let student_id = resolved.student.student_id;

    let lecture = match scan.lecture_id {
      Some(raw) => {
        // A malformed id cannot name a stored lecture.
        let lecture_id = Uuid::parse_str(raw).map_err(ScanError::persistence)?;

        if store
          .find_attendance(student_id, lecture_id)
          .await
          .map_err(ScanError::persistence)?
          .is_some()
        {
          tracing::debug!(%student_id, %lecture_id, "duplicate lecture scan");
          return Err(ScanError::AlreadyRecorded);
        }

        let lecture = store
          .get_lecture(lecture_id)
          .await
          .map_err(ScanError::persistence)?
          .ok_or_else(|| {
            ScanError::PersistenceFailure(format!("lecture {lecture_id} does not exist").into())
          })?;
        Some(lecture)
      }
      None => None,
    };

    let status = AttendanceStatus::for_scan(
      now,
      lecture.as_ref().map(|l| l.start_time),
      self.late_after,
    );

    let outcome = store
      .record_attendance(NewAttendance {
        student_id,
        card_id: resolved.card.card_id,
        lecture_id: lecture.as_ref().map(|l| l.lecture_id),
        gateway_id: gateway.gateway_id,
        device_id: device.device_id,
        scanned_at: now,
        status,
        note: None,
      })
      .await
      .map_err(ScanError::persistence)?;

    let record = match outcome {
      InsertOutcome::Inserted(record) => record,
      InsertOutcome::Duplicate => {
        tracing::debug!(%student_id, "lecture scan lost an insert race");
        return Err(ScanError::AlreadyRecorded);
      }
    };

    liveness::stamp(store, device.device_id, now).await;

    tracing::info!(
      %student_id,
      attendance_id = %record.attendance_id,
      gateway = %gateway.code,
      device = %device.device_code,
      status = status.as_ref(),
      "attendance recorded"
    );

    Ok(ScanReceipt {
      student: resolved.student,
      attendance_id: record.attendance_id,
      status,
      scanned_at: record.scanned_at,
    })
  }
}

/// Resolve both halves of the physical endpoint. Either one missing is the
/// same failure.
async fn resolve_endpoint<S>(
  store: &S,
  gateway_code: &str,
  device_code: &str,
) -> Result<(Gateway, Device), ScanError>
where
  S: AttendanceStore,
{
  let (gateway, device) = tokio::join!(
    store.find_gateway(gateway_code),
    store.find_device(device_code),
  );
  let gateway = gateway.map_err(ScanError::persistence)?;
  let device = device.map_err(ScanError::persistence)?;

  match (gateway, device) {
    (Some(g), Some(d)) => Ok((g, d)),
    _ => Err(ScanError::EndpointNotRegistered),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use roll_core::{
    attendance::AttendanceRecord,
    card::{Card, NewCard, ResolvedCard},
    endpoint::{DeviceKind, GatewayKind, NewDevice, NewGateway},
    lecture::{Lecture, LectureStatus, NewLecture},
    store::AttendanceQuery,
    student::NewStudent,
  };
  use roll_store_sqlite::SqliteStore;

  use super::*;

  const CARD: &str = "NFC001234567890";

  struct Campus {
    store:   Arc<SqliteStore>,
    student: Student,
    card_id: Uuid,
    lecture: Lecture,
  }

  impl Campus {
    fn validator(&self) -> ScanValidator<SqliteStore> {
      ScanValidator::new(Arc::clone(&self.store), Duration::minutes(10))
    }

    async fn count(&self, lecture_id: Option<Uuid>) -> usize {
      let query = AttendanceQuery {
        student_id: Some(self.student.student_id),
        lecture_id,
        ..Default::default()
      };
      self.store.list_attendance(&query).await.unwrap().len()
    }
  }

  async fn campus() -> Campus {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let student = store
      .add_student(NewStudent {
        student_number: "S1".into(),
        first_name:     "Tomás".into(),
        last_name:      "Reyes".into(),
        faculty:        "Science".into(),
        department:     "Physics".into(),
        ..Default::default()
      })
      .await
      .unwrap();
    let card = store
      .issue_card(NewCard { student_id: student.student_id, card_uid: CARD.into() })
      .await
      .unwrap();
    store
      .add_gateway(NewGateway {
        code:         "MAIN_GATE".into(),
        display_name: "Main Gate".into(),
        location:     String::new(),
        kind:         GatewayKind::Gate,
      })
      .await
      .unwrap();
    store
      .add_device(NewDevice {
        device_code: "DEV001".into(),
        device_name: "Main gate scanner".into(),
        kind:        DeviceKind::Scanner,
      })
      .await
      .unwrap();
    let start = Utc::now().trunc_subsecs(6);
    let lecture = store
      .add_lecture(NewLecture {
        title:      "Thermodynamics".into(),
        gateway_id: None,
        start_time: start,
        end_time:   start + Duration::minutes(90),
        status:     LectureStatus::Active,
      })
      .await
      .unwrap();

    Campus { store: Arc::new(store), student, card_id: card.card_id, lecture }
  }

  fn gate_scan() -> ScanRequest { ScanRequest::gate(CARD, "DEV001", "MAIN_GATE") }

  // ── Request shape ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_fields_are_a_bad_request() {
    let c = campus().await;
    let v = c.validator();

    let mut req = gate_scan();
    req.device_code = None;
    assert!(matches!(v.scan(&req).await, Err(ScanError::BadRequest)));

    let mut req = gate_scan();
    req.card_uid = Some("   ".into());
    assert!(matches!(v.scan(&req).await, Err(ScanError::BadRequest)));

    assert_eq!(c.count(None).await, 0);
  }

  #[tokio::test]
  async fn bad_request_outranks_unknown_card() {
    let c = campus().await;
    let req = ScanRequest { card_uid: Some("NFC-UNKNOWN".into()), ..Default::default() };
    assert!(matches!(c.validator().scan(&req).await, Err(ScanError::BadRequest)));
  }

  // ── Card resolution ─────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_card_is_not_found_and_writes_nothing() {
    let c = campus().await;
    let req = ScanRequest::gate("NFC000000000000", "DEV001", "MAIN_GATE");
    let err = c.validator().scan(&req).await.unwrap_err();
    assert_eq!(err.code(), "card_not_found");
    assert_eq!(c.count(None).await, 0);
  }

  #[tokio::test]
  async fn inactive_card_looks_exactly_like_unknown() {
    let c = campus().await;
    c.store.deactivate_card(c.card_id).await.unwrap();

    let err = c.validator().scan(&gate_scan()).await.unwrap_err();
    assert!(matches!(err, ScanError::CardNotFound));
    assert_eq!(c.count(None).await, 0);
  }

  #[tokio::test]
  async fn unknown_card_outranks_unknown_endpoint() {
    let c = campus().await;
    let req = ScanRequest::gate("NFC-NOPE", "DEV404", "NOWHERE");
    let err = c.validator().scan(&req).await.unwrap_err();
    assert!(matches!(err, ScanError::CardNotFound));
  }

  // ── Endpoint resolution ─────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_gateway_or_device_is_one_error() {
    let c = campus().await;
    let v = c.validator();

    let req = ScanRequest::gate(CARD, "DEV001", "SIDE_GATE");
    assert!(matches!(v.scan(&req).await, Err(ScanError::EndpointNotRegistered)));

    let req = ScanRequest::gate(CARD, "DEV999", "MAIN_GATE");
    assert!(matches!(v.scan(&req).await, Err(ScanError::EndpointNotRegistered)));

    assert_eq!(c.count(None).await, 0);
  }

  // ── Gate scans ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn gate_scan_records_present_without_lecture() {
    let c = campus().await;
    let receipt = c.validator().scan(&gate_scan()).await.unwrap();

    assert_eq!(receipt.status, AttendanceStatus::Present);
    assert_eq!(receipt.student.student_id, c.student.student_id);

    let records = c
      .store
      .list_attendance(&AttendanceQuery::default())
      .await
      .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attendance_id, receipt.attendance_id);
    assert_eq!(records[0].lecture_id, None);
    assert_eq!(records[0].card_id, c.card_id);
  }

  #[tokio::test]
  async fn repeated_gate_scans_each_create_a_record() {
    let c = campus().await;
    let v = c.validator();

    let mut ids = HashSet::new();
    for _ in 0..3 {
      let receipt = v.scan(&gate_scan()).await.unwrap();
      assert_eq!(receipt.status, AttendanceStatus::Present);
      ids.insert(receipt.attendance_id);
    }
    assert_eq!(ids.len(), 3);
    assert_eq!(c.count(None).await, 3);
  }

  #[tokio::test]
  async fn empty_lecture_id_is_a_gate_scan() {
    let c = campus().await;
    let req = gate_scan().with_lecture("");
    c.validator().scan(&req).await.unwrap();
    c.validator().scan(&req).await.unwrap();
    assert_eq!(c.count(None).await, 2);
  }

  #[tokio::test]
  async fn gate_scan_stamps_device() {
    let c = campus().await;
    let receipt = c.validator().scan(&gate_scan()).await.unwrap();
    let device = c.store.find_device("DEV001").await.unwrap().unwrap();
    assert_eq!(device.last_seen, Some(receipt.scanned_at));
  }

  // ── Lecture scans ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn second_lecture_scan_is_already_recorded() {
    let c = campus().await;
    let v = c.validator();
    let req = gate_scan().with_lecture(c.lecture.lecture_id);

    v.scan(&req).await.unwrap();
    let err = v.scan(&req).await.unwrap_err();
    assert!(matches!(err, ScanError::AlreadyRecorded));
    assert_eq!(c.count(Some(c.lecture.lecture_id)).await, 1);
  }

  #[tokio::test]
  async fn concurrent_lecture_scans_record_exactly_once() {
    let c = campus().await;
    let req = gate_scan().with_lecture(c.lecture.lecture_id);

    let handles: Vec<_> = (0..2)
      .map(|_| {
        let v = c.validator();
        let req = req.clone();
        tokio::spawn(async move { v.scan(&req).await })
      })
      .collect();

    let mut ok = 0;
    let mut dup = 0;
    for h in handles {
      match h.await.unwrap() {
        Ok(_) => ok += 1,
        Err(ScanError::AlreadyRecorded) => dup += 1,
        Err(e) => panic!("unexpected error: {e}"),
      }
    }
    assert_eq!((ok, dup), (1, 1));
    assert_eq!(c.count(Some(c.lecture.lecture_id)).await, 1);
  }

  #[tokio::test]
  async fn scan_within_offset_is_present() {
    let c = campus().await;
    let req = gate_scan().with_lecture(c.lecture.lecture_id);
    let at = c.lecture.start_time + Duration::minutes(10);

    let receipt = c.validator().scan_at(&req, at).await.unwrap();
    assert_eq!(receipt.status, AttendanceStatus::Present);
    assert_eq!(receipt.scanned_at, at);
  }

  #[tokio::test]
  async fn scan_past_offset_is_late() {
    let c = campus().await;
    let req = gate_scan().with_lecture(c.lecture.lecture_id);
    let at = c.lecture.start_time + Duration::minutes(10) + Duration::seconds(1);

    let receipt = c.validator().scan_at(&req, at).await.unwrap();
    assert_eq!(receipt.status, AttendanceStatus::Late);

    let stored = c
      .store
      .find_attendance(c.student.student_id, c.lecture.lecture_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(stored.status, AttendanceStatus::Late);
  }

  #[tokio::test]
  async fn unknown_lecture_fails_without_recording() {
    let c = campus().await;
    let req = gate_scan().with_lecture(Uuid::new_v4());
    let err = c.validator().scan(&req).await.unwrap_err();
    assert_eq!(err.code(), "attendance_recording_failed");

    let req = gate_scan().with_lecture("not-a-uuid");
    let err = c.validator().scan(&req).await.unwrap_err();
    assert_eq!(err.code(), "attendance_recording_failed");

    assert_eq!(c.count(None).await, 0);
  }

  #[tokio::test]
  async fn receipt_time_matches_stored_time() {
    let c = campus().await;
    let at = c.lecture.start_time + Duration::nanoseconds(1_234_567_891);

    let receipt = c
      .validator()
      .scan_at(&gate_scan().with_lecture(c.lecture.lecture_id), at)
      .await
      .unwrap();
    let stored = c
      .store
      .find_attendance(c.student.student_id, c.lecture.lecture_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(receipt.scanned_at, stored.scanned_at);
    assert_eq!(receipt.scanned_at, at.trunc_subsecs(6));
  }

  // ── Provisioned whitespace ──────────────────────────────────────────────

  #[tokio::test]
  async fn card_issued_with_padding_still_scans() {
    let c = campus().await;
    c.store
      .issue_card(NewCard { student_id: c.student.student_id, card_uid: "NFC001 ".into() })
      .await
      .unwrap();
    c.store
      .add_gateway(NewGateway {
        code:         " EAST_GATE".into(),
        display_name: "East Gate".into(),
        location:     String::new(),
        kind:         GatewayKind::Gate,
      })
      .await
      .unwrap();

    let receipt = c
      .validator()
      .scan(&ScanRequest::gate("NFC001 ", "DEV001", " EAST_GATE"))
      .await
      .unwrap();
    assert_eq!(receipt.student.student_id, c.student.student_id);
  }

  // ── Store faults ────────────────────────────────────────────────────────

  #[derive(Clone, Copy)]
  enum Fault {
    /// The duplicate pre-check never finds anything, as when a concurrent
    /// scan commits between the check and the insert.
    MissedPrecheck,
    /// The insert never completes and the store gives up after `STALL`.
    StalledInsert,
  }

  const STALL: std::time::Duration = std::time::Duration::from_millis(20);

  /// SQLite underneath, with one call misbehaving according to `fault`.
  struct FaultyStore {
    inner: Arc<SqliteStore>,
    fault: Fault,
  }

  type StoreResult<T> = Result<T, roll_store_sqlite::Error>;

  impl AttendanceStore for FaultyStore {
    type Error = roll_store_sqlite::Error;

    async fn add_student(&self, input: NewStudent) -> StoreResult<Student> {
      self.inner.add_student(input).await
    }

    async fn get_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
      self.inner.get_student(id).await
    }

    async fn issue_card(&self, input: NewCard) -> StoreResult<Card> {
      self.inner.issue_card(input).await
    }

    async fn deactivate_card(&self, card_id: Uuid) -> StoreResult<Option<Card>> {
      self.inner.deactivate_card(card_id).await
    }

    async fn add_gateway(&self, input: NewGateway) -> StoreResult<Gateway> {
      self.inner.add_gateway(input).await
    }

    async fn add_device(&self, input: NewDevice) -> StoreResult<Device> {
      self.inner.add_device(input).await
    }

    async fn list_devices(&self) -> StoreResult<Vec<Device>> { self.inner.list_devices().await }

    async fn add_lecture(&self, input: NewLecture) -> StoreResult<Lecture> {
      self.inner.add_lecture(input).await
    }

    async fn get_lecture(&self, id: Uuid) -> StoreResult<Option<Lecture>> {
      self.inner.get_lecture(id).await
    }

    async fn set_lecture_status(
      &self,
      id: Uuid,
      status: LectureStatus,
    ) -> StoreResult<Option<Lecture>> {
      self.inner.set_lecture_status(id, status).await
    }

    async fn resolve_card<'a>(&'a self, card_uid: &'a str) -> StoreResult<Option<ResolvedCard>> {
      self.inner.resolve_card(card_uid).await
    }

    async fn find_gateway<'a>(&'a self, code: &'a str) -> StoreResult<Option<Gateway>> {
      self.inner.find_gateway(code).await
    }

    async fn find_device<'a>(&'a self, device_code: &'a str) -> StoreResult<Option<Device>> {
      self.inner.find_device(device_code).await
    }

    async fn find_attendance(
      &self,
      student_id: Uuid,
      lecture_id: Uuid,
    ) -> StoreResult<Option<AttendanceRecord>> {
      match self.fault {
        Fault::MissedPrecheck => Ok(None),
        Fault::StalledInsert => self.inner.find_attendance(student_id, lecture_id).await,
      }
    }

    async fn record_attendance(&self, input: NewAttendance) -> StoreResult<InsertOutcome> {
      match self.fault {
        Fault::MissedPrecheck => self.inner.record_attendance(input).await,
        Fault::StalledInsert => {
          tokio::time::timeout(STALL, std::future::pending::<InsertOutcome>())
            .await
            .map_err(|_| roll_store_sqlite::Error::Timeout(STALL))
        }
      }
    }

    async fn touch_device(&self, device_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
      self.inner.touch_device(device_id, at).await
    }

    async fn list_attendance<'a>(
      &'a self,
      query: &'a AttendanceQuery,
    ) -> StoreResult<Vec<AttendanceRecord>> {
      self.inner.list_attendance(query).await
    }
  }

  impl Campus {
    fn faulty_validator(&self, fault: Fault) -> ScanValidator<FaultyStore> {
      let store = FaultyStore { inner: Arc::clone(&self.store), fault };
      ScanValidator::new(Arc::new(store), Duration::minutes(10))
    }
  }

  #[tokio::test]
  async fn insert_rejected_by_uniqueness_is_already_recorded() {
    let c = campus().await;
    let v = c.faulty_validator(Fault::MissedPrecheck);
    let req = gate_scan().with_lecture(c.lecture.lecture_id);

    v.scan(&req).await.unwrap();
    let err = v.scan(&req).await.unwrap_err();
    assert!(matches!(err, ScanError::AlreadyRecorded), "{err}");
    assert_eq!(c.count(Some(c.lecture.lecture_id)).await, 1);
  }

  #[tokio::test]
  async fn store_timeout_is_a_persistence_failure() {
    let c = campus().await;
    let v = c.faulty_validator(Fault::StalledInsert);

    let err = v.scan(&gate_scan()).await.unwrap_err();
    assert!(matches!(err, ScanError::PersistenceFailure(_)));
    assert_eq!(err.code(), "attendance_recording_failed");
    assert_eq!(c.count(None).await, 0);

    let device = c.store.find_device("DEV001").await.unwrap().unwrap();
    assert!(device.last_seen.is_none());
  }
}
