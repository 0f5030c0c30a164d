//! SQL schema for the Roll SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    student_number TEXT NOT NULL UNIQUE,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    faculty        TEXT NOT NULL,
    department     TEXT NOT NULL,
    email          TEXT,
    phone          TEXT,
    photo_url      TEXT,
    role           TEXT NOT NULL DEFAULT 'student',
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    card_id    TEXT PRIMARY KEY,
    card_uid   TEXT NOT NULL,
    student_id TEXT NOT NULL REFERENCES students(student_id),
    is_active  INTEGER NOT NULL DEFAULT 1,
    issued_at  TEXT NOT NULL
);

-- At most one active card per physical uid.
CREATE UNIQUE INDEX IF NOT EXISTS cards_active_uid_idx
    ON cards(card_uid) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS gateways (
    gateway_id   TEXT PRIMARY KEY,
    code         TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    location     TEXT NOT NULL DEFAULT '',
    kind         TEXT NOT NULL    -- 'gate' | 'classroom'
);

CREATE TABLE IF NOT EXISTS devices (
    device_id   TEXT PRIMARY KEY,
    device_code TEXT NOT NULL UNIQUE,
    device_name TEXT NOT NULL,
    kind        TEXT NOT NULL,    -- 'mobile' | 'scanner' | 'tablet'
    is_active   INTEGER NOT NULL DEFAULT 1,
    last_seen   TEXT
);

CREATE TABLE IF NOT EXISTS lectures (
    lecture_id TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    gateway_id TEXT REFERENCES gateways(gateway_id),
    start_time TEXT NOT NULL,
    end_time   TEXT NOT NULL,
    status     TEXT NOT NULL DEFAULT 'scheduled'
);

-- Attendance is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS attendance (
    attendance_id TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL REFERENCES students(student_id),
    card_id       TEXT NOT NULL REFERENCES cards(card_id),
    lecture_id    TEXT REFERENCES lectures(lecture_id),   -- NULL for gate scans
    gateway_id    TEXT NOT NULL REFERENCES gateways(gateway_id),
    device_id     TEXT NOT NULL REFERENCES devices(device_id),
    scanned_at    TEXT NOT NULL,   -- RFC 3339 UTC, microseconds; server-assigned
    status        TEXT NOT NULL,   -- 'present' | 'late' | 'excused'
    note          TEXT
);

-- One record per (student, lecture). Gate scans are never deduplicated.
CREATE UNIQUE INDEX IF NOT EXISTS attendance_student_lecture_idx
    ON attendance(student_id, lecture_id) WHERE lecture_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS attendance_scanned_idx ON attendance(scanned_at);
CREATE INDEX IF NOT EXISTS attendance_gateway_idx ON attendance(gateway_id);

PRAGMA user_version = 1;
";
