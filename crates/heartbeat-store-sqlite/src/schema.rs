//! SQL schema for the Heartbeat SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so text ordering is
/// chronological ordering.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    age         INTEGER CHECK (age IS NULL OR age > 0),
    location    TEXT NOT NULL DEFAULT '',
    bio         TEXT NOT NULL DEFAULT '',
    avatar_url  TEXT,
    interests   TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    created_at  TEXT NOT NULL,                -- candidate ordering key
    updated_at  TEXT NOT NULL
);

-- Decisions are insert-only. No UPDATE or DELETE is ever issued here.
CREATE TABLE IF NOT EXISTS matches (
    decision_id      TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES profiles(id),
    matched_user_id  TEXT NOT NULL REFERENCES profiles(id),
    status           TEXT NOT NULL CHECK (status IN ('liked', 'disliked', 'matched')),
    created_at       TEXT NOT NULL,
    UNIQUE (user_id, matched_user_id),
    CHECK  (user_id != matched_user_id)
);

CREATE TABLE IF NOT EXISTS accounts (
    user_id        TEXT PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

-- Only a hash of each bearer token is kept.
CREATE TABLE IF NOT EXISTS sessions (
    token_hash  TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES accounts(user_id),
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_created_idx ON profiles(created_at DESC, id);
CREATE INDEX IF NOT EXISTS matches_status_idx   ON matches(user_id, status);
CREATE INDEX IF NOT EXISTS sessions_user_idx    ON sessions(user_id);

PRAGMA user_version = 1;
";
