//! Helpers shared by command implementations.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::config::{self, Settings};
use crate::error::{Error, RemoteFetchKind, Result};
use crate::graph::GraphClient;
use crate::storage::SqliteStorage;
use crate::thread::{CredentialSource, SyncReport};
use crate::validate::{validate_access_token, validate_thread_id};

/// Values every network command needs, resolved once.
pub struct CommandContext {
    pub settings: Settings,
    pub thread_id: String,
}

impl CommandContext {
    /// Load settings and resolve the thread.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unreadable settings file, `NotConfigured` if
    /// no thread is set, `InvalidArgument` if it is not numeric.
    pub fn load(thread: Option<&str>) -> Result<Self> {
        let settings = Settings::load()?;
        let thread_id = validate_thread_id(&config::resolve_thread_id(thread, &settings)?)?;
        Ok(Self { settings, thread_id })
    }

    /// Open (creating if needed) the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be determined or opened.
    pub fn open_storage(&self, db: Option<&Path>) -> Result<SqliteStorage> {
        open_storage(db, &self.settings)
    }

    /// Build a Graph client from the resolved token and settings.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` without a token, or an error if the HTTP
    /// client cannot be built.
    pub fn graph_client(&self, token: Option<&str>) -> Result<GraphClient> {
        let token = validate_access_token(&config::resolve_access_token(token, &self.settings)?)?;
        let graph = config::graph_config(&self.settings);
        GraphClient::with_config(
            token,
            Some(graph.endpoint),
            Some(graph.api_version),
            Some(graph.timeout),
        )
    }
}

/// Open the database at the resolved path, creating parent directories.
///
/// # Errors
///
/// Returns an error if the location cannot be determined or opened.
pub fn open_storage(db: Option<&Path>, settings: &Settings) -> Result<SqliteStorage> {
    let path = config::resolve_db_path(db, settings)
        .ok_or_else(|| Error::Config("Could not determine database location".to_string()))?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    SqliteStorage::open(&path)
}

/// Runtime for one network command.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// Print `value` as one line of JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Print the outcome of `pull` or `update`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_sync_report(title: &str, report: &SyncReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("{} thread {}", title.green().bold(), report.thread_id.bold());
    println!("  Pages:        {}", report.pages);
    println!("  Posts stored: {} ({} fetched)", report.posts_stored, report.posts_fetched);
    if let Some(n) = report.participants {
        println!("  Participants: {n}");
    }
    if let Some(hwm) = &report.high_water_mark {
        println!("  Newest post:  {hwm}");
    }
    println!("  {}", format!("run {}", report.run_id).dimmed());
    Ok(())
}

/// Format Unix milliseconds for humans.
#[must_use]
pub fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Asks on the terminal for a replacement token when the current one expires.
pub struct PromptCredentials;

impl CredentialSource for PromptCredentials {
    fn next_credential(&mut self) -> Result<String> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Err(Error::remote(
                RemoteFetchKind::CredentialExpired,
                "access token expired and no terminal is attached to ask for a new one",
            ));
        }

        eprint!("Access token expired. Paste a new access token: ");
        std::io::stderr().flush()?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        validate_access_token(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_millis(1_428_368_952_000), "2015-04-07 01:09:12 UTC");
    }

    #[test]
    fn test_open_storage_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("threadsync.db");
        let storage = open_storage(Some(&path), &Settings::default()).unwrap();
        assert_eq!(storage.count_posts("999").unwrap(), 0);
        assert!(path.exists());
    }
}
