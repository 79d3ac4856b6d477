//! Graph transport trait.
//!
//! The sync engine consumes exactly one remote operation: fetch an object
//! (or edge) by path with query parameters. Credentials are held by the
//! transport and injected on every request, never taken from a cursor.

use std::collections::BTreeMap;

use crate::error::Result;

/// Query parameters for a Graph request, sorted for stable logs and tests.
pub type QueryParams = BTreeMap<String, String>;

/// Trait for Graph API transports.
///
/// Implemented by [`super::GraphClient`] over HTTP and by the test mock.
/// Failures are classified into `RemoteFetchKind`s; no retries happen at
/// this layer.
pub trait GraphTransport: Send + Sync {
    /// Fetch `path` (e.g. `"999"` or `"999/comments"`) and return the raw JSON.
    fn fetch_object(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> impl std::future::Future<Output = Result<serde_json::Value>> + Send;

    /// Replace the credential used for subsequent requests.
    fn set_access_token(&mut self, token: String);
}
