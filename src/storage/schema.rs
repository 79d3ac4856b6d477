//! Database schema definitions.
//!
//! Post identities are stored twice: the composite id as the natural key, and
//! the canonical digits plus their length so `ORDER BY seq_len, seq` sorts
//! numerically without overflowing an INTEGER column.

use rusqlite::{Connection, Result};

/// Current schema version, recorded in `schema_migrations`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema.
///
/// Timestamps are INTEGER Unix milliseconds.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Thread Content
-- ====================

-- Posts: one row per comment, never updated once stored
CREATE TABLE IF NOT EXISTS posts (
    thread_id TEXT NOT NULL,
    post_id TEXT NOT NULL,
    seq TEXT NOT NULL,
    seq_len INTEGER NOT NULL,
    author_id TEXT,
    author_name TEXT,
    message TEXT,
    created_at INTEGER,
    raw TEXT NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, post_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_seq ON posts(thread_id, seq_len DESC, seq DESC);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(thread_id, author_id);

-- Participants: last fetched roster, replaced wholesale
CREATE TABLE IF NOT EXISTS participants (
    thread_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    name TEXT,
    position INTEGER NOT NULL,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, participant_id)
);

-- ====================
-- Bookkeeping
-- ====================

CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL,
    mode TEXT NOT NULL CHECK (mode IN ('pull', 'update')),
    status TEXT NOT NULL DEFAULT 'running' CHECK (status IN ('running', 'completed', 'failed')),
    pages INTEGER NOT NULL DEFAULT 0,
    posts_stored INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_thread ON sync_runs(thread_id, started_at DESC);
"#;

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
