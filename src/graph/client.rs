//! HTTP Graph API transport.
//!
//! Issues token-authenticated GET requests with reqwest and classifies
//! failures so the recovery layer can tell throttling and expired tokens
//! apart from fatal errors.

use crate::error::{Error, RemoteFetchKind, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::transport::{GraphTransport, QueryParams};

/// Default Graph API host.
pub const DEFAULT_ENDPOINT: &str = "https://graph.facebook.com";

/// Default Graph API version segment.
pub const DEFAULT_API_VERSION: &str = "v2.3";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Graph error codes that mean "slow down".
const RATE_LIMIT_CODES: &[i64] = &[4, 17, 32, 613];

/// Graph error codes that mean "token no longer valid".
const CREDENTIAL_CODES: &[i64] = &[102, 190];

/// Graph API transport over reqwest.
pub struct GraphClient {
    client: reqwest::Client,
    endpoint: String,
    api_version: String,
    access_token: String,
}

impl GraphClient {
    /// Create a client against the default endpoint and version.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(access_token: String) -> Result<Self> {
        Self::with_config(access_token, None, None, None)
    }

    /// Create a client with explicit endpoint, API version and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(
        access_token: String,
        endpoint: Option<String>,
        api_version: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            access_token,
        })
    }

    /// Full request URL for `path`, without query string.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    /// The credential currently in use.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Graph error envelope: `{"error": {"message", "type", "code", ...}}`.
#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Classify a non-success response from its HTTP status and body.
#[must_use]
pub fn classify_failure(status: u16, body: &str) -> (RemoteFetchKind, String) {
    let parsed = serde_json::from_str::<GraphErrorEnvelope>(body).ok();
    let code = parsed.as_ref().and_then(|e| e.error.code);
    let message = parsed
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| format!("HTTP {status}: {body}"));

    let kind = match code {
        Some(c) if RATE_LIMIT_CODES.contains(&c) => RemoteFetchKind::RateLimited,
        Some(c) if CREDENTIAL_CODES.contains(&c) => RemoteFetchKind::CredentialExpired,
        _ if status == 429 => RemoteFetchKind::RateLimited,
        _ if status == 401 => RemoteFetchKind::CredentialExpired,
        _ => RemoteFetchKind::Other,
    };

    (kind, message)
}

impl GraphTransport for GraphClient {
    async fn fetch_object(&self, path: &str, params: &QueryParams) -> Result<serde_json::Value> {
        let url = self.url_for(path);
        debug!(%url, ?params, "Graph request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    RemoteFetchKind::Timeout
                } else {
                    RemoteFetchKind::Other
                };
                // Strip the URL: it carries the access token.
                Error::remote(kind, format!("Graph request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (kind, message) = classify_failure(status.as_u16(), &body);
            return Err(Error::remote(kind, message));
        }

        response.json().await.map_err(|e| {
            Error::remote(
                RemoteFetchKind::Other,
                format!("Failed to parse Graph response: {}", e.without_url()),
            )
        })
    }

    fn set_access_token(&mut self, token: String) {
        self.access_token = token;
    }
}
