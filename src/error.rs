//! Error types for threadsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 5=remote, etc.)
//! - Retryability flags, plus the narrower `is_recoverable` used by the
//!   rate-limit / credential recovery loop
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for threadsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Remote failure kinds ──────────────────────────────────────

/// Classification of a failed Graph API fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFetchKind {
    /// The request did not complete within the client timeout.
    Timeout,
    /// The API asked us to slow down (Graph codes 4/17/32/613, HTTP 429).
    RateLimited,
    /// The access token is expired or revoked (Graph codes 102/190).
    CredentialExpired,
    /// Anything else. Fatal.
    Other,
}

impl fmt::Display for RemoteFetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::CredentialExpired => "credential expired",
            Self::Other => "remote error",
        };
        f.write_str(s)
    }
}

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    NothingSynced,

    // Validation (exit 4)
    InvalidArgument,
    InvalidIdentifier,

    // Remote (exit 5)
    RemoteTimeout,
    RateLimited,
    CredentialExpired,
    RemoteError,

    // Page shape (exit 6)
    MalformedPage,

    // Config (exit 7)
    ConfigError,
    NotConfigured,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NothingSynced => "NOTHING_SYNCED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidIdentifier => "INVALID_IDENTIFIER",
            Self::RemoteTimeout => "REMOTE_TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::CredentialExpired => "CREDENTIAL_EXPIRED",
            Self::RemoteError => "REMOTE_ERROR",
            Self::MalformedPage => "MALFORMED_PAGE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::NothingSynced => 3,
            Self::InvalidArgument | Self::InvalidIdentifier => 4,
            Self::RemoteTimeout | Self::RateLimited | Self::CredentialExpired | Self::RemoteError => 5,
            Self::MalformedPage => 6,
            Self::ConfigError | Self::NotConfigured => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same command later can reasonably succeed.
    ///
    /// True for transient remote failures and database contention.
    /// False for malformed pages, bad input and configuration problems.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteTimeout | Self::RateLimited | Self::CredentialExpired | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in threadsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed page: missing or invalid `{field}`")]
    MalformedPage { field: String },

    #[error("Remote fetch failed ({kind}): {message}")]
    RemoteFetch { kind: RemoteFetchKind, message: String },

    #[error("Invalid post identifier: {id}")]
    InvalidIdentifier { id: String },

    #[error("Not configured: {setting}")]
    NotConfigured { setting: String },

    #[error("Nothing synced yet for thread {thread_id}")]
    NothingSynced { thread_id: String },

    #[error("Settings file not writable at {path}")]
    SettingsNotWritable { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a missing/invalid field in a page response.
    pub fn malformed(field: impl Into<String>) -> Self {
        Self::MalformedPage { field: field.into() }
    }

    /// Shorthand for a classified transport failure.
    pub fn remote(kind: RemoteFetchKind, message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            kind,
            message: message.into(),
        }
    }

    /// The remote failure kind, if this is a transport failure.
    #[must_use]
    pub const fn remote_kind(&self) -> Option<RemoteFetchKind> {
        match self {
            Self::RemoteFetch { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the recovery layer can handle this error by cooling down or
    /// rotating the credential and re-issuing the same request.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self.remote_kind(),
            Some(RemoteFetchKind::RateLimited | RemoteFetchKind::CredentialExpired)
        )
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MalformedPage { .. } => ErrorCode::MalformedPage,
            Self::RemoteFetch { kind, .. } => match kind {
                RemoteFetchKind::Timeout => ErrorCode::RemoteTimeout,
                RemoteFetchKind::RateLimited => ErrorCode::RateLimited,
                RemoteFetchKind::CredentialExpired => ErrorCode::CredentialExpired,
                RemoteFetchKind::Other => ErrorCode::RemoteError,
            },
            Self::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            Self::NotConfigured { .. } => ErrorCode::NotConfigured,
            Self::NothingSynced { .. } => ErrorCode::NothingSynced,
            Self::SettingsNotWritable { .. } | Self::Config(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotConfigured { setting } => Some(format!(
                "Set {setting} with `threadsync init`, a command-line flag, or its THREADSYNC_* environment variable."
            )),

            Self::NothingSynced { thread_id } => Some(format!(
                "No stored posts for thread {thread_id}. Run `threadsync pull` first."
            )),

            Self::RemoteFetch { kind, .. } => match kind {
                RemoteFetchKind::RateLimited => Some(
                    "The Graph API is throttling this token. Wait a few minutes and re-run."
                        .to_string(),
                ),
                RemoteFetchKind::CredentialExpired => Some(
                    "The access token expired. Pass a fresh one with --token or THREADSYNC_ACCESS_TOKEN."
                        .to_string(),
                ),
                RemoteFetchKind::Timeout => Some(
                    "The request timed out. Raise graph.timeout_secs in the settings file or retry."
                        .to_string(),
                ),
                RemoteFetchKind::Other => None,
            },

            Self::SettingsNotWritable { path } => Some(format!(
                "Check permissions on {} or point THREADSYNC_CONFIG at a writable file.",
                path.display()
            )),

            Self::InvalidArgument(msg) => {
                if msg.contains("report") {
                    Some("Valid reports: authors, links. Synonyms: users→authors, urls→links".to_string())
                } else if msg.contains("thread") {
                    Some("Thread ids are the numeric id of the conversation, e.g. 999".to_string())
                } else {
                    None
                }
            }

            Self::MalformedPage { .. }
            | Self::InvalidIdentifier { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
