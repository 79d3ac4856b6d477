//! Cursor-based pages and the paginator that walks them.
//!
//! A Graph edge page looks like:
//!
//! ```json
//! {"data": [...], "paging": {"next": "https://graph.facebook.com/v2.3/999/comments?access_token=..&limit=25&until=12"}}
//! ```
//!
//! `paging.next` points at the next, chronologically older page. A page
//! without it is the oldest available page.

use reqwest::Url;
use tracing::debug;

use super::transport::{GraphTransport, QueryParams};
use crate::error::{Error, Result};
use crate::model::{Post, PostIdentity};

/// Query parameters that carry credentials and must never be replayed from a cursor.
pub const CREDENTIAL_PARAMS: &[&str] = &["access_token", "appsecret_proof"];

/// A continuation: the path and parameters of the next page request.
///
/// Built from the opaque `paging.next` URL with any credential removed.
/// The transport injects its own credential on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub path: String,
    pub params: QueryParams,
}

impl Cursor {
    /// Parse a `paging.next` URL into a cursor.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage { field: "paging.next" }` if the value is not a URL.
    pub fn parse(next: &str) -> Result<Self> {
        let url = Url::parse(next).map_err(|_| Error::malformed("paging.next"))?;

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        if segments.first().is_some_and(|s| is_api_version(s)) {
            segments.remove(0);
        }
        if segments.is_empty() {
            return Err(Error::malformed("paging.next"));
        }

        let params = url
            .query_pairs()
            .filter(|(k, _)| !CREDENTIAL_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            path: segments.join("/"),
            params,
        })
    }

    /// The `until` boundary of this cursor, if present.
    #[must_use]
    pub fn until(&self) -> Option<&str> {
        self.params.get("until").map(String::as_str)
    }
}

/// `v2.3`, `v19.0` and friends.
fn is_api_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .and_then(|rest| rest.split_once('.'))
        .is_some_and(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        })
}

/// One page of posts plus an optional continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage {
    pub items: Vec<Post>,
    pub next: Option<Cursor>,
}

impl CursorPage {
    /// Parse an edge page `{data: [...], paging?: {next?}}`.
    ///
    /// Every item's composite id is validated here, so posts held by the
    /// engine always have an identity.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage` if `data` is absent or not an array, an item is
    /// not a post, or `paging.next` is not a URL.
    pub fn parse(raw: &serde_json::Value) -> Result<Self> {
        let data = raw
            .get("data")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| Error::malformed("data"))?;

        let items = data
            .iter()
            .map(|item| {
                let post: Post =
                    serde_json::from_value(item.clone()).map_err(|_| Error::malformed("data[].id"))?;
                post.identity().map_err(|_| Error::malformed("data[].id"))?;
                Ok(post)
            })
            .collect::<Result<Vec<_>>>()?;

        let next = match raw.get("paging").and_then(|p| p.get("next")) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(url)) => Some(Cursor::parse(url)?),
            Some(_) => return Err(Error::malformed("paging.next")),
        };

        Ok(Self { items, next })
    }

    /// Parse the `comments` edge embedded in a thread root object.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage` if `comments` is missing or malformed.
    pub fn parse_embedded(root: &serde_json::Value, edge: &str) -> Result<Self> {
        let page = root.get(edge).ok_or_else(|| Error::malformed(edge))?;
        Self::parse(page).map_err(|e| match e {
            Error::MalformedPage { field } => Error::malformed(format!("{edge}.{field}")),
            other => other,
        })
    }

    /// True when no older page exists.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }

    /// Identity of the newest post (numeric max), independent of item order.
    #[must_use]
    pub fn newest_identity(&self) -> Option<PostIdentity> {
        self.identities().max()
    }

    /// Identity of the oldest post (numeric min), independent of item order.
    #[must_use]
    pub fn oldest_identity(&self) -> Option<PostIdentity> {
        self.identities().min()
    }

    fn identities(&self) -> impl Iterator<Item = PostIdentity> + '_ {
        // Validated in `parse`.
        self.items.iter().filter_map(|p| p.identity().ok())
    }
}

/// Walks continuation cursors to fetch older pages.
///
/// Owns the transport so the engine has a single place that talks to the
/// network. One request per `advance`, no retries.
pub struct Paginator<T: GraphTransport> {
    transport: T,
}

impl<T: GraphTransport> Paginator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Fetch the page `cursor` points at.
    ///
    /// Returns `Ok(None)` without touching the network when there is no cursor.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn advance(&self, cursor: Option<&Cursor>) -> Result<Option<CursorPage>> {
        let Some(cursor) = cursor else {
            return Ok(None);
        };
        self.follow(cursor).await.map(Some)
    }

    /// Fetch the page `cursor` points at.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn follow(&self, cursor: &Cursor) -> Result<CursorPage> {
        debug!(path = %cursor.path, until = ?cursor.until(), "Following page cursor");
        let raw = self.transport.fetch_object(&cursor.path, &cursor.params).await?;
        CursorPage::parse(&raw)
    }

    /// Fetch an edge directly, without a cursor.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn fetch_first(&self, path: &str) -> Result<CursorPage> {
        let raw = self.transport.fetch_object(path, &QueryParams::new()).await?;
        CursorPage::parse(&raw)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
