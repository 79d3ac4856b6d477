//! Configuration management.
//!
//! Every setting resolves in the same order:
//!
//! 1. Explicit value (command-line flag)
//! 2. `THREADSYNC_*` environment variable
//! 3. Settings file (`~/.threadsync/config.json`)
//! 4. Built-in default, or a `NotConfigured` error when there is none

mod settings;

pub use settings::{GraphSettings, RateLimitSettings, Settings};

use crate::error::{Error, Result};
use crate::graph::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT};

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ACCESS_TOKEN_ENV: &str = "THREADSYNC_ACCESS_TOKEN";
pub const THREAD_ID_ENV: &str = "THREADSYNC_THREAD_ID";
pub const DB_ENV: &str = "THREADSYNC_DB";
pub const ENDPOINT_ENV: &str = "THREADSYNC_GRAPH_ENDPOINT";
/// Overrides the settings file location.
pub const CONFIG_ENV: &str = "THREADSYNC_CONFIG";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Get the global threadsync directory, `~/.threadsync/`.
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".threadsync"))
}

/// Location of the settings file.
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    env_value(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| global_dir().map(|dir| dir.join("config.json")))
}

/// Non-empty, trimmed value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First candidate that is present and not blank.
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates.into_iter().flatten().find_map(non_empty)
}

/// Resolve the database path.
///
/// Falls back to `~/.threadsync/data/threadsync.db`.
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>, settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value(DB_ENV) {
        return Some(PathBuf::from(path));
    }
    if let Some(path) = &settings.db_path {
        return Some(path.clone());
    }
    global_dir().map(|dir| dir.join("data").join("threadsync.db"))
}

/// Resolve the Graph API access token.
///
/// # Errors
///
/// Returns `NotConfigured` if no source provides one.
pub fn resolve_access_token(explicit: Option<&str>, settings: &Settings) -> Result<String> {
    first_non_empty([
        explicit.map(str::to_string),
        env_value(ACCESS_TOKEN_ENV),
        settings.graph.access_token.clone(),
    ])
    .ok_or_else(|| Error::NotConfigured {
        setting: "access token".to_string(),
    })
}

/// Resolve the thread to sync.
///
/// # Errors
///
/// Returns `NotConfigured` if no source provides one.
pub fn resolve_thread_id(explicit: Option<&str>, settings: &Settings) -> Result<String> {
    first_non_empty([
        explicit.map(str::to_string),
        env_value(THREAD_ID_ENV),
        settings.graph.thread_id.clone(),
    ])
    .ok_or_else(|| Error::NotConfigured {
        setting: "thread id".to_string(),
    })
}

/// Where and how to reach the Graph API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub endpoint: String,
    pub api_version: String,
    pub timeout: Duration,
}

#[must_use]
pub fn graph_config(settings: &Settings) -> GraphConfig {
    GraphConfig {
        endpoint: first_non_empty([env_value(ENDPOINT_ENV), settings.graph.endpoint.clone()])
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        api_version: first_non_empty([settings.graph.api_version.clone()])
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        timeout: Duration::from_secs(settings.graph.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty() {
        assert_eq!(
            first_non_empty([None, Some("  ".into()), Some(" abc ".into()), Some("def".into())]),
            Some("abc".to_string())
        );
        assert_eq!(first_non_empty([None, Some(String::new())]), None);
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit), &Settings::default());
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default_is_global() {
        if std::env::var(DB_ENV).is_ok() {
            return;
        }
        let path = resolve_db_path(None, &Settings::default()).unwrap();
        assert!(path.ends_with("data/threadsync.db"));
        assert!(path.starts_with(global_dir().unwrap()));
    }

    #[test]
    fn test_resolve_db_path_from_settings() {
        if std::env::var(DB_ENV).is_ok() {
            return;
        }
        let mut settings = Settings::default();
        settings.db_path = Some(PathBuf::from("/srv/thread.db"));
        assert_eq!(
            resolve_db_path(None, &settings),
            Some(PathBuf::from("/srv/thread.db"))
        );
    }

    #[test]
    fn test_explicit_token_wins() {
        let mut settings = Settings::default();
        settings.graph.access_token = Some("from-file".into());
        assert_eq!(resolve_access_token(Some("flag"), &settings).unwrap(), "flag");
        if std::env::var(ACCESS_TOKEN_ENV).is_err() {
            assert_eq!(resolve_access_token(Some("  "), &settings).unwrap(), "from-file");
        }
    }

    #[test]
    fn test_missing_thread_is_not_configured() {
        if std::env::var(THREAD_ID_ENV).is_ok() {
            return;
        }
        let err = resolve_thread_id(None, &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::NotConfigured { .. }));
        assert_eq!(err.exit_code(), 7);

        let mut settings = Settings::default();
        settings.graph.thread_id = Some("999".into());
        assert_eq!(resolve_thread_id(None, &settings).unwrap(), "999");
    }

    #[test]
    fn test_graph_config_defaults() {
        if std::env::var(ENDPOINT_ENV).is_ok() {
            return;
        }
        let config = graph_config(&Settings::default());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.api_version, "v2.3");
        assert_eq!(config.timeout, Duration::from_secs(60));

        let mut settings = Settings::default();
        settings.graph.api_version = Some("v19.0".into());
        settings.graph.timeout_secs = Some(5);
        let config = graph_config(&settings);
        assert_eq!(config.api_version, "v19.0");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
