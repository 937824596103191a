//! SQL schema for the festive SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL,
    full_name   TEXT,
    company     TEXT,
    markets     TEXT NOT NULL DEFAULT '[]',   -- JSON array, first = primary
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    contact_id    TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(user_id),
    email         TEXT NOT NULL,
    display_name  TEXT,
    status        TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'inactive' | 'converted'
    created_at    TEXT NOT NULL
);

-- One row per (user, occasion); upserted, never deleted.
CREATE TABLE IF NOT EXISTS preferences (
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    occasion_id  TEXT NOT NULL,
    enabled      INTEGER NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (user_id, occasion_id)
);

-- The dedup ledger. The primary key is the reservation primitive: a second
-- insert for the same triple affects zero rows.
CREATE TABLE IF NOT EXISTS dispatch_records (
    occasion_id    TEXT    NOT NULL,
    contact_id     TEXT    NOT NULL,
    occasion_year  INTEGER NOT NULL,
    reserved_at    TEXT    NOT NULL,
    sent_at        TEXT,
    message_id     TEXT,
    PRIMARY KEY (occasion_id, contact_id, occasion_year)
);

CREATE INDEX IF NOT EXISTS contacts_user_status_idx ON contacts(user_id, status);
CREATE INDEX IF NOT EXISTS preferences_occasion_idx ON preferences(occasion_id, enabled);
CREATE INDEX IF NOT EXISTS dispatch_year_idx        ON dispatch_records(occasion_year);

PRAGMA user_version = 1;
";
