//! SQLite storage implementation.
//!
//! Writes go through [`SqliteStorage::mutate`], which wraps each batch in an
//! IMMEDIATE transaction so a drained page is stored entirely or not at all.

use crate::error::{Error, Result};
use crate::model::{Participant, Post, PostIdentity};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Which command a sync run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Initial fetch plus backfill to the beginning of the thread.
    Pull,
    /// Catch-up from the most recently stored post.
    Update,
}

impl SyncMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Update => "update",
        }
    }
}

/// A recorded `pull` or `update` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: String,
    pub thread_id: String,
    pub mode: String,
    pub status: String,
    pub pages: i64,
    pub posts_stored: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
}

/// Post count per author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author_id: String,
    pub author_name: Option<String>,
    pub posts: i64,
}

/// A stored post that contains at least one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPost {
    pub post_id: String,
    pub author_name: Option<String>,
    pub created_at: Option<i64>,
    pub links: Vec<String>,
}

/// Per-thread rollup for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub posts: i64,
    pub participants: i64,
    pub most_recent_post_id: Option<String>,
    pub last_synced_at: Option<i64>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside an IMMEDIATE transaction, committing on success.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "Committed");
        Ok(result)
    }

    // ==================
    // Post Operations
    // ==================

    /// Store a batch of posts, skipping ones already stored.
    ///
    /// Returns how many rows were actually inserted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` for a post without a valid composite id,
    /// or a database error. Nothing is stored on error.
    pub fn add_posts(&mut self, thread_id: &str, posts: &[Post]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("add_posts", |tx| {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO posts
                 (thread_id, post_id, seq, seq_len, author_id, author_name, message, created_at, raw, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            let mut inserted = 0;
            for post in posts {
                let identity = post.identity()?;
                let raw = serde_json::to_string(post)?;
                inserted += stmt.execute(rusqlite::params![
                    thread_id,
                    post.id,
                    identity.as_str(),
                    identity.digit_len() as i64,
                    post.from.as_ref().map(|a| a.id.as_str()),
                    post.from.as_ref().and_then(|a| a.name.as_deref()),
                    post.message,
                    post.created_at().map(|t| t.timestamp_millis()),
                    raw,
                    now,
                ])?;
            }
            Ok(inserted)
        })
    }

    /// Numerically largest stored post identity for a thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored identity is corrupt.
    pub fn most_recent_post_id(&self, thread_id: &str) -> Result<Option<PostIdentity>> {
        let seq: Option<String> = self
            .conn
            .query_row(
                "SELECT seq FROM posts WHERE thread_id = ?1
                 ORDER BY seq_len DESC, seq DESC LIMIT 1",
                [thread_id],
                |row| row.get(0),
            )
            .optional()?;
        seq.as_deref().map(PostIdentity::parse).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_posts(&self, thread_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
            [thread_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Stored posts in chronological order, optionally only the newest `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored record no longer parses.
    pub fn list_posts(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Post>> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(
            "SELECT raw FROM (
                 SELECT raw, seq_len, seq FROM posts WHERE thread_id = ?1
                 ORDER BY seq_len DESC, seq DESC LIMIT ?2
             ) ORDER BY seq_len ASC, seq ASC",
        )?;
        let raws = stmt
            .query_map(rusqlite::params![thread_id, limit], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raws.iter()
            .map(|raw| serde_json::from_str(raw).map_err(Error::from))
            .collect()
    }

    // ==================
    // Participant Operations
    // ==================

    /// Replace the stored roster for a thread, keeping roster order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; the old roster stays in place.
    pub fn replace_participants(&mut self, thread_id: &str, roster: &[Participant]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("replace_participants", |tx| {
            tx.execute("DELETE FROM participants WHERE thread_id = ?1", [thread_id])?;

            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO participants (thread_id, participant_id, name, position, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, p) in roster.iter().enumerate() {
                stmt.execute(rusqlite::params![thread_id, p.id, p.name, position as i64, now])?;
            }
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_participants(&self, thread_id: &str) -> Result<Vec<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT participant_id, name FROM participants WHERE thread_id = ?1 ORDER BY position",
        )?;
        let roster = stmt
            .query_map([thread_id], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(roster)
    }

    // ==================
    // Reports
    // ==================

    /// Post counts per author, most active first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn posts_by_author(&self, thread_id: &str) -> Result<Vec<AuthorCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT author_id, MAX(author_name), COUNT(*) AS n
             FROM posts WHERE thread_id = ?1 AND author_id IS NOT NULL
             GROUP BY author_id
             ORDER BY n DESC, author_id ASC",
        )?;
        let rows = stmt
            .query_map([thread_id], |row| {
                Ok(AuthorCount {
                    author_id: row.get(0)?,
                    author_name: row.get(1)?,
                    posts: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest posts whose message carries an http(s) link.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored record no longer parses.
    pub fn link_posts(&self, thread_id: &str, limit: usize) -> Result<Vec<LinkPost>> {
        let mut stmt = self.conn.prepare(
            "SELECT raw, created_at FROM posts
             WHERE thread_id = ?1 AND (message LIKE '%http://%' OR message LIKE '%https://%')
             ORDER BY seq_len DESC, seq DESC",
        )?;
        let rows = stmt
            .query_map([thread_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        for (raw, created_at) in rows {
            if out.len() >= limit {
                break;
            }
            let post: Post = serde_json::from_str(&raw)?;
            let links: Vec<String> = post.links().into_iter().map(str::to_string).collect();
            if links.is_empty() {
                continue;
            }
            out.push(LinkPost {
                post_id: post.id.clone(),
                author_name: post.from.and_then(|a| a.name),
                created_at,
                links,
            });
        }
        Ok(out)
    }

    // ==================
    // Sync Runs
    // ==================

    /// Record the start of a sync run and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn begin_sync_run(&mut self, thread_id: &str, mode: SyncMode) -> Result<String> {
        let id = format!("run_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("begin_sync_run", |tx| {
            tx.execute(
                "INSERT INTO sync_runs (id, thread_id, mode, started_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, thread_id, mode.as_str(), now],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Close a sync run. A present `error` marks it failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn finish_sync_run(
        &mut self,
        id: &str,
        pages: usize,
        posts_stored: usize,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let status = if error.is_some() { "failed" } else { "completed" };

        self.mutate("finish_sync_run", |tx| {
            tx.execute(
                "UPDATE sync_runs SET status = ?1, pages = ?2, posts_stored = ?3, error = ?4, finished_at = ?5
                 WHERE id = ?6",
                rusqlite::params![status, pages as i64, posts_stored as i64, error, now, id],
            )?;
            Ok(())
        })
    }

    /// Most recent sync runs, optionally for one thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_sync_runs(&self, thread_id: Option<&str>, limit: usize) -> Result<Vec<SyncRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, thread_id, mode, status, pages, posts_stored, error, started_at, finished_at
             FROM sync_runs
             WHERE ?1 IS NULL OR thread_id = ?1
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(rusqlite::params![thread_id, limit as i64], map_sync_run_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// One summary row per thread with stored posts or participants.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn thread_summaries(&self) -> Result<Vec<ThreadSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.thread_id,
                    (SELECT COUNT(*) FROM posts p WHERE p.thread_id = t.thread_id),
                    (SELECT COUNT(*) FROM participants r WHERE r.thread_id = t.thread_id),
                    (SELECT seq FROM posts p WHERE p.thread_id = t.thread_id
                     ORDER BY seq_len DESC, seq DESC LIMIT 1),
                    (SELECT MAX(finished_at) FROM sync_runs s
                     WHERE s.thread_id = t.thread_id AND s.status = 'completed')
             FROM (SELECT thread_id FROM posts UNION SELECT thread_id FROM participants) t
             ORDER BY t.thread_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ThreadSummary {
                    thread_id: row.get(0)?,
                    posts: row.get(1)?,
                    participants: row.get(2)?,
                    most_recent_post_id: row.get(3)?,
                    last_synced_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_sync_run_row(row: &rusqlite::Row) -> rusqlite::Result<SyncRun> {
    Ok(SyncRun {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        mode: row.get(2)?,
        status: row.get(3)?,
        pages: row.get(4)?,
        posts_stored: row.get(5)?,
        error: row.get(6)?,
        started_at: row.get(7)?,
        finished_at: row.get(8)?,
    })
}
