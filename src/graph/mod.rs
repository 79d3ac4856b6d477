//! Graph API access.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ ThreadSyncEngine │
//! └────────┬─────────┘
//!          │ cursors
//!          ▼
//! ┌─────────────────┐
//! │    Paginator    │  ← one request per page, no retries
//! └────────┬────────┘
//!          │ fetch_object(path, params)
//!          ▼
//! ┌─────────────────┐
//! │ GraphTransport  │  ← GraphClient (reqwest) or the test mock
//! └─────────────────┘
//! ```
//!
//! Failures surface as `Error::RemoteFetch` with a `RemoteFetchKind`;
//! recovering from them is the caller's job (see `thread::recovery`).

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod page;
pub mod transport;

pub use client::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT, GraphClient, classify_failure};
pub use page::{CREDENTIAL_PARAMS, Cursor, CursorPage, Paginator};
pub use transport::{GraphTransport, QueryParams};
