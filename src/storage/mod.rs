//! SQLite storage layer.
//!
//! - WAL mode for concurrent reads while a sync writes
//! - One IMMEDIATE transaction per drained batch
//! - Posts keyed by `(thread_id, post_id)`, so re-storing a page is a no-op
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{AuthorCount, LinkPost, SqliteStorage, SyncMode, SyncRun, ThreadSummary};
