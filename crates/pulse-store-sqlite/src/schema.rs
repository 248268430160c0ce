//! SQL schema for the Pulse SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Append-only. Timestamps are RFC 3339 UTC with millisecond precision and a
-- trailing 'Z', so string order is time order.
CREATE TABLE IF NOT EXISTS events (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    received_at       TEXT NOT NULL,
    client_ts         TEXT,
    campaign_id       TEXT,
    game_id           TEXT,
    session_id        TEXT,
    anonymous_user_id TEXT,
    event_name        TEXT NOT NULL,
    props             TEXT NOT NULL DEFAULT '{}'   -- JSON
);

CREATE INDEX IF NOT EXISTS idx_events_event_ts  ON events(event_name, client_ts);
CREATE INDEX IF NOT EXISTS idx_events_campaign  ON events(campaign_id);
CREATE INDEX IF NOT EXISTS idx_events_game      ON events(game_id);
CREATE INDEX IF NOT EXISTS idx_events_session   ON events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_anon      ON events(anonymous_user_id);

CREATE TABLE IF NOT EXISTS banners (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    banner_id  TEXT NOT NULL,
    name       TEXT NOT NULL,
    url        TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_banners_banner_id ON banners(banner_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_banners_url       ON banners(url);

-- Append-only.
CREATE TABLE IF NOT EXISTS registrations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    session_id  TEXT,
    campaign_id TEXT,
    game_id     TEXT,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT NOT NULL,
    score       INTEGER,
    duration_ms INTEGER
);

CREATE INDEX IF NOT EXISTS idx_regs_created  ON registrations(created_at);
CREATE INDEX IF NOT EXISTS idx_regs_campaign ON registrations(campaign_id);
CREATE INDEX IF NOT EXISTS idx_regs_game     ON registrations(game_id);

PRAGMA user_version = 1;
";
