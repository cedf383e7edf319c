//! Turn-log schema.

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Full DDL for the turn log.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Completed chat turns
CREATE TABLE IF NOT EXISTS turns (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    convo_id    TEXT NOT NULL,
    input       TEXT NOT NULL,
    output      TEXT NOT NULL,
    iterations  INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Tool round-trips within turns
CREATE TABLE IF NOT EXISTS tool_calls (
    id          TEXT PRIMARY KEY,
    turn_id     TEXT NOT NULL REFERENCES turns(id),
    seq         INTEGER NOT NULL,
    tool_name   TEXT NOT NULL,
    input       TEXT NOT NULL,
    output      TEXT,
    success     INTEGER NOT NULL DEFAULT 1
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(user_id, convo_id, created_at);
CREATE INDEX IF NOT EXISTS idx_tool_calls_turn ON tool_calls(turn_id);
"#;
