//! [`SqliteStore`], the SQLite implementation of [`AttendanceStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, SubsecRound as _, Utc};
use roll_core::{
  attendance::{AttendanceRecord, InsertOutcome, NewAttendance},
  card::{Card, NewCard, ResolvedCard},
  endpoint::{Device, Gateway, NewDevice, NewGateway},
  lecture::{Lecture, LectureStatus, NewLecture},
  store::{AttendanceQuery, AttendanceStore},
  student::{NewStudent, Student},
};
use rusqlite::{OptionalExtension as _, ffi};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ATTENDANCE_COLUMNS, CARD_COLUMNS, DEVICE_COLUMNS, GATEWAY_COLUMNS,
    LECTURE_COLUMNS, RawAttendance, RawCard, RawDevice, RawGateway, RawLecture,
    RawStudent, STUDENT_COLUMNS, encode_dt, encode_uuid,
  },
  error::constraint_of,
  schema::SCHEMA,
};

/// Upper bound on any single database call unless overridden with
/// [`SqliteStore::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, timeout: DEFAULT_TIMEOUT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, timeout: DEFAULT_TIMEOUT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Bound every subsequent call by `timeout`.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the database thread, failing with [`Error::Timeout`] if it
  /// does not finish in time.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    match tokio::time::timeout(self.timeout, self.conn.call(f)).await {
      Ok(res) => Ok(res?),
      Err(_) => Err(Error::Timeout(self.timeout)),
    }
  }

  async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>> {
    let id_str = encode_uuid(card_id);
    let sql = format!("SELECT {CARD_COLUMNS} FROM cards c WHERE c.card_id = ?1");

    let raw: Option<RawCard> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], |row| RawCard::read(row, 0))
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCard::into_card).transpose()
  }
}

/// Map a UNIQUE violation on a code column to [`Error::DuplicateCode`].
fn duplicate_code(err: Error, code: String) -> Error {
  match err.constraint() {
    Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => Error::DuplicateCode(code),
    _ => err,
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Provisioning ──────────────────────────────────────────────────────────

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    let student = Student {
      student_id:     Uuid::new_v4(),
      student_number: input.student_number,
      first_name:     input.first_name,
      last_name:      input.last_name,
      faculty:        input.faculty,
      department:     input.department,
      email:          input.email,
      phone:          input.phone,
      photo_url:      input.photo_url,
      role:           input.role,
      created_at:     Utc::now().trunc_subsecs(6),
    };

    let s = student.clone();
    let id_str = encode_uuid(s.student_id);
    let at_str = encode_dt(s.created_at);
    let role_str = s.role.as_ref().to_owned();

    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (
             student_id, student_number, first_name, last_name, faculty,
             department, email, phone, photo_url, role, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            s.student_number,
            s.first_name,
            s.last_name,
            s.faculty,
            s.department,
            s.email,
            s.phone,
            s.photo_url,
            role_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| duplicate_code(e, student.student_number.clone()))?;

    Ok(student)
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(id);
    let sql =
      format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE s.student_id = ?1");

    let raw: Option<RawStudent> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], |row| {
              RawStudent::read(row, 0)
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn issue_card(&self, input: NewCard) -> Result<Card> {
    let card = Card {
      card_id:    Uuid::new_v4(),
      card_uid:   input.card_uid.trim().to_owned(),
      student_id: input.student_id,
      is_active:  true,
      issued_at:  Utc::now().trunc_subsecs(6),
    };

    let id_str = encode_uuid(card.card_id);
    let uid = card.card_uid.clone();
    let student_str = encode_uuid(card.student_id);
    let at_str = encode_dt(card.issued_at);

    let res = self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cards (card_id, card_uid, student_id, is_active, issued_at)
           VALUES (?1, ?2, ?3, 1, ?4)",
          rusqlite::params![id_str, uid, student_str, at_str],
        )?;
        Ok(())
      })
      .await;

    match res {
      Ok(()) => Ok(card),
      Err(e) => Err(match e.constraint() {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => Error::CardUidInUse(card.card_uid),
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
          Error::StudentNotFound(card.student_id)
        }
        _ => e,
      }),
    }
  }

  async fn deactivate_card(&self, card_id: Uuid) -> Result<Option<Card>> {
    let id_str = encode_uuid(card_id);

    let changed = self
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE cards SET is_active = 0 WHERE card_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_card(card_id).await
  }

  async fn add_gateway(&self, input: NewGateway) -> Result<Gateway> {
    let gateway = Gateway {
      gateway_id:   Uuid::new_v4(),
      code:         input.code.trim().to_owned(),
      display_name: input.display_name,
      location:     input.location,
      kind:         input.kind,
    };

    let g = gateway.clone();
    let id_str = encode_uuid(g.gateway_id);
    let kind_str = g.kind.as_ref().to_owned();

    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO gateways (gateway_id, code, display_name, location, kind)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, g.code, g.display_name, g.location, kind_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| duplicate_code(e, gateway.code.clone()))?;

    Ok(gateway)
  }

  async fn add_device(&self, input: NewDevice) -> Result<Device> {
    let device = Device {
      device_id:   Uuid::new_v4(),
      device_code: input.device_code.trim().to_owned(),
      device_name: input.device_name,
      kind:        input.kind,
      is_active:   true,
      last_seen:   None,
    };

    let d = device.clone();
    let id_str = encode_uuid(d.device_id);
    let kind_str = d.kind.as_ref().to_owned();

    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO devices (device_id, device_code, device_name, kind, is_active)
           VALUES (?1, ?2, ?3, ?4, 1)",
          rusqlite::params![id_str, d.device_code, d.device_name, kind_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| duplicate_code(e, device.device_code.clone()))?;

    Ok(device)
  }

  async fn list_devices(&self) -> Result<Vec<Device>> {
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices d ORDER BY d.device_code");

    let raws: Vec<RawDevice> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| RawDevice::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDevice::into_device).collect()
  }

  async fn add_lecture(&self, input: NewLecture) -> Result<Lecture> {
    let lecture = Lecture {
      lecture_id: Uuid::new_v4(),
      title:      input.title,
      gateway_id: input.gateway_id,
      start_time: input.start_time.trunc_subsecs(6),
      end_time:   input.end_time.trunc_subsecs(6),
      status:     input.status,
    };

    let id_str = encode_uuid(lecture.lecture_id);
    let title = lecture.title.clone();
    let gateway_str = lecture.gateway_id.map(encode_uuid);
    let start_str = encode_dt(lecture.start_time);
    let end_str = encode_dt(lecture.end_time);
    let status_str = lecture.status.as_ref().to_owned();

    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lectures (lecture_id, title, gateway_id, start_time, end_time, status)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, title, gateway_str, start_str, end_str, status_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(lecture)
  }

  async fn get_lecture(&self, id: Uuid) -> Result<Option<Lecture>> {
    let id_str = encode_uuid(id);
    let sql =
      format!("SELECT {LECTURE_COLUMNS} FROM lectures l WHERE l.lecture_id = ?1");

    let raw: Option<RawLecture> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], |row| {
              RawLecture::read(row, 0)
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLecture::into_lecture).transpose()
  }

  async fn set_lecture_status(
    &self,
    id: Uuid,
    status: LectureStatus,
  ) -> Result<Option<Lecture>> {
    let id_str = encode_uuid(id);
    let status_str = status.as_ref().to_owned();

    let changed = self
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE lectures SET status = ?2 WHERE lecture_id = ?1",
          rusqlite::params![id_str, status_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_lecture(id).await
  }

  // ── Scan-path reads ───────────────────────────────────────────────────────

  async fn resolve_card<'a>(&'a self, card_uid: &'a str) -> Result<Option<ResolvedCard>> {
    let uid = card_uid.to_owned();
    let sql = format!(
      "SELECT {CARD_COLUMNS}, {STUDENT_COLUMNS}
       FROM cards c
       JOIN students s ON s.student_id = c.student_id
       WHERE c.card_uid = ?1 AND c.is_active = 1"
    );

    let raw: Option<(RawCard, RawStudent)> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![uid], |row| {
              Ok((RawCard::read(row, 0)?, RawStudent::read(row, 5)?))
            })
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(card, student)| -> Result<ResolvedCard> {
        Ok(ResolvedCard { card: card.into_card()?, student: student.into_student()? })
      })
      .transpose()
  }

  async fn find_gateway<'a>(&'a self, code: &'a str) -> Result<Option<Gateway>> {
    let code = code.to_owned();
    let sql = format!("SELECT {GATEWAY_COLUMNS} FROM gateways g WHERE g.code = ?1");

    let raw: Option<RawGateway> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code], |row| RawGateway::read(row, 0))
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGateway::into_gateway).transpose()
  }

  async fn find_device<'a>(&'a self, device_code: &'a str) -> Result<Option<Device>> {
    let code = device_code.to_owned();
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices d WHERE d.device_code = ?1");

    let raw: Option<RawDevice> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code], |row| RawDevice::read(row, 0))
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDevice::into_device).transpose()
  }

  async fn find_attendance(
    &self,
    student_id: Uuid,
    lecture_id: Uuid,
  ) -> Result<Option<AttendanceRecord>> {
    let student_str = encode_uuid(student_id);
    let lecture_str = encode_uuid(lecture_id);
    let sql = format!(
      "SELECT {ATTENDANCE_COLUMNS} FROM attendance a
       WHERE a.student_id = ?1 AND a.lecture_id = ?2"
    );

    let raw: Option<RawAttendance> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![student_str, lecture_str], |row| {
              RawAttendance::read(row, 0)
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  // ── Scan-path writes ──────────────────────────────────────────────────────

  async fn record_attendance(&self, input: NewAttendance) -> Result<InsertOutcome> {
    let record = AttendanceRecord {
      attendance_id: Uuid::new_v4(),
      student_id:    input.student_id,
      card_id:       input.card_id,
      lecture_id:    input.lecture_id,
      gateway_id:    input.gateway_id,
      device_id:     input.device_id,
      scanned_at:    input.scanned_at.trunc_subsecs(6),
      status:        input.status,
      note:          input.note,
    };

    let id_str      = encode_uuid(record.attendance_id);
    let student_str = encode_uuid(record.student_id);
    let card_str    = encode_uuid(record.card_id);
    let lecture_str = record.lecture_id.map(encode_uuid);
    let gateway_str = encode_uuid(record.gateway_id);
    let device_str  = encode_uuid(record.device_id);
    let at_str      = encode_dt(record.scanned_at);
    let status_str  = record.status.as_ref().to_owned();
    let note        = record.note.clone();

    let inserted = self
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO attendance (
             attendance_id, student_id, card_id, lecture_id, gateway_id,
             device_id, scanned_at, status, note
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            student_str,
            card_str,
            lecture_str,
            gateway_str,
            device_str,
            at_str,
            status_str,
            note,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if constraint_of(&e) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      Ok(InsertOutcome::Inserted(record))
    } else {
      tracing::debug!(
        student_id = %record.student_id,
        lecture_id = ?record.lecture_id,
        "attendance insert rejected by uniqueness constraint"
      );
      Ok(InsertOutcome::Duplicate)
    }
  }

  async fn touch_device(&self, device_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    let id_str = encode_uuid(device_id);
    let at_str = encode_dt(at);

    let changed = self
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE devices SET last_seen = ?2 WHERE device_id = ?1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::DeviceNotFound(device_id));
    }
    Ok(())
  }

  // ── Listings ──────────────────────────────────────────────────────────────

  async fn list_attendance<'a>(
    &'a self,
    query: &'a AttendanceQuery,
  ) -> Result<Vec<AttendanceRecord>> {
    let lecture_str = query.lecture_id.map(encode_uuid);
    let student_str = query.student_id.map(encode_uuid);
    let gateway_str = query.gateway_id.map(encode_uuid);
    let since_str   = query.since.map(encode_dt);
    let limit_val   = query.limit.unwrap_or(100) as i64;

    let sql = format!(
      "SELECT {ATTENDANCE_COLUMNS} FROM attendance a
       WHERE (?1 IS NULL OR a.lecture_id = ?1)
         AND (?2 IS NULL OR a.student_id = ?2)
         AND (?3 IS NULL OR a.gateway_id = ?3)
         AND (?4 IS NULL OR a.scanned_at >= ?4)
       ORDER BY a.scanned_at DESC, a.rowid DESC
       LIMIT ?5"
    );

    let raws: Vec<RawAttendance> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![lecture_str, student_str, gateway_str, since_str, limit_val],
            |row| RawAttendance::read(row, 0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_record).collect()
  }
}
