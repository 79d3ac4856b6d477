//! Settings file.
//!
//! `~/.threadsync/config.json`, every field optional:
//!
//! ```json
//! {
//!   "graph": {"access_token": "...", "thread_id": "999", "endpoint": "...", "api_version": "v2.3", "timeout_secs": 60},
//!   "db_path": "/path/to/threadsync.db",
//!   "rate_limit": {"cooldown_secs": 100, "max_cooldown_secs": 3600, "max_attempts": 10}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::thread::RecoveryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cooldown_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    pub rate_limit: RateLimitSettings,
}

impl Settings {
    /// Read settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Read settings from the default location (see [`super::settings_path`]).
    ///
    /// # Errors
    ///
    /// See [`Self::load_from`].
    pub fn load() -> Result<Self> {
        match super::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write settings to `path` via a temp file and rename.
    ///
    /// The file holds an access token, so it is created owner-only on unix.
    ///
    /// # Errors
    ///
    /// Returns `SettingsNotWritable` if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let not_writable = |_| Error::SettingsNotWritable {
            path: path.to_path_buf(),
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(not_writable)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");

        (|| -> std::io::Result<()> {
            {
                let mut opts = fs::OpenOptions::new();
                opts.write(true).create(true).truncate(true);
                #[cfg(unix)]
                opts.mode(0o600);
                let mut file = opts.open(&temp_path)?;
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
                file.flush()?;
            }
            fs::rename(&temp_path, path)
        })()
        .map_err(not_writable)
    }

    /// Overlay every value present in `other`.
    pub fn merge(&mut self, other: Self) {
        fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        overlay(&mut self.graph.access_token, other.graph.access_token);
        overlay(&mut self.graph.thread_id, other.graph.thread_id);
        overlay(&mut self.graph.endpoint, other.graph.endpoint);
        overlay(&mut self.graph.api_version, other.graph.api_version);
        overlay(&mut self.graph.timeout_secs, other.graph.timeout_secs);
        overlay(&mut self.db_path, other.db_path);
        overlay(&mut self.rate_limit.cooldown_secs, other.rate_limit.cooldown_secs);
        overlay(&mut self.rate_limit.max_cooldown_secs, other.rate_limit.max_cooldown_secs);
        overlay(&mut self.rate_limit.max_attempts, other.rate_limit.max_attempts);
    }

    /// Recovery policy with file overrides applied to the defaults.
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy {
        let defaults = RecoveryPolicy::default();
        RecoveryPolicy {
            initial_cooldown: self
                .rate_limit
                .cooldown_secs
                .map_or(defaults.initial_cooldown, Duration::from_secs),
            max_cooldown: self
                .rate_limit
                .max_cooldown_secs
                .map_or(defaults.max_cooldown, Duration::from_secs),
            max_attempts: self.rate_limit.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.graph.access_token = Some("token".into());
        settings.graph.thread_id = Some("999".into());
        settings.rate_limit.max_attempts = Some(3);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(!path.with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"graph": {"thread_id": "42"}}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.graph.thread_id.as_deref(), Some("42"));
        assert_eq!(settings.graph.access_token, None);
        assert_eq!(settings.rate_limit, RateLimitSettings::default());
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_merge_keeps_unset_values() {
        let mut base = Settings::default();
        base.graph.access_token = Some("old".into());
        base.graph.thread_id = Some("999".into());

        let mut update = Settings::default();
        update.graph.access_token = Some("new".into());
        update.db_path = Some(PathBuf::from("/tmp/t.db"));
        base.merge(update);

        assert_eq!(base.graph.access_token.as_deref(), Some("new"));
        assert_eq!(base.graph.thread_id.as_deref(), Some("999"));
        assert_eq!(base.db_path, Some(PathBuf::from("/tmp/t.db")));
    }

    #[test]
    fn test_recovery_policy_overrides() {
        let mut settings = Settings::default();
        assert_eq!(settings.recovery_policy(), RecoveryPolicy::default());

        settings.rate_limit.cooldown_secs = Some(5);
        settings.rate_limit.max_attempts = Some(2);
        let policy = settings.recovery_policy();
        assert_eq!(policy.initial_cooldown, Duration::from_secs(5));
        assert_eq!(policy.max_cooldown, Duration::from_secs(3600));
        assert_eq!(policy.max_attempts, 2);
    }
}
