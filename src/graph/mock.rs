//! In-memory Graph transport replaying thread `999`.
//!
//! The thread holds posts `999_1 ..= 999_<newest>`, paged 25 at a time from
//! the newest end. The newest page's cursor carries `until=<oldest id>`, and
//! `until=u` serves the 25 posts just below `u`. Orders mirror the states the
//! engine is tested against:
//!
//! | order            | newest | roster |
//! |------------------|--------|--------|
//! | default          | 36     | 8      |
//! | full update      | 61     | 9      |
//! | partial update   | 42     | 7      |
//! | large update     | 86     | 9      |

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Value, json};

use super::transport::{GraphTransport, QueryParams};
use crate::error::{Error, RemoteFetchKind, Result};

pub const THREAD_ID: &str = "999";
pub const PAGE_SIZE: u64 = 25;

/// The first page's `paging.next` in the default order.
pub const NEXT_UNTIL_12: &str = "https://graph.facebook.com/v2.3/999/comments?access_token=placeholder&limit=25&until=12&__paging_token=enc_AxccviosOthErPLaCEHoLDer";

pub struct MockGraph {
    newest: u64,
    roster: u64,
    newest_first: bool,
    empty_tail: bool,
    token: String,
    requests: Mutex<Vec<(String, QueryParams)>>,
    failures: Mutex<VecDeque<Error>>,
}

impl MockGraph {
    pub fn new() -> Self {
        Self {
            newest: 36,
            roster: 8,
            newest_first: false,
            empty_tail: false,
            token: "access_token".to_string(),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// A thread with no comments at all.
    pub fn empty() -> Self {
        let mut mock = Self::new();
        mock.newest = 0;
        mock
    }

    pub fn use_default_order(&mut self) {
        self.newest = 36;
        self.roster = 8;
    }

    pub fn use_full_update_order(&mut self) {
        self.newest = 61;
        self.roster = 9;
    }

    pub fn use_partial_update_order(&mut self) {
        self.newest = 42;
        self.roster = 7;
    }

    pub fn use_large_update_order(&mut self) {
        self.newest = 86;
        self.roster = 9;
    }

    /// Serve items newest-first within each page instead of the Graph default.
    pub fn with_newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Give the oldest page a cursor to one more, empty, page.
    pub fn with_empty_tail(mut self) -> Self {
        self.empty_tail = true;
        self
    }

    /// Fail the next request with `err` before serving anything.
    pub fn fail_next(&self, err: Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_with(&self, kind: RemoteFetchKind) {
        self.fail_next(Error::remote(kind, format!("injected {kind}")));
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn requests(&self) -> Vec<(String, QueryParams)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn post(&self, n: u64) -> Value {
        let author = n % 8 + 1;
        let message = if n % 5 == 0 {
            format!("post {n} https://example.com/{n}")
        } else {
            format!("post {n}")
        };
        json!({
            "id": format!("{THREAD_ID}_{n}"),
            "created_time": format!("2015-04-07T{:02}:{:02}:00+0000", (n / 60) % 24, n % 60),
            "from": {"id": format!("u{author}"), "name": format!("User {author}")},
            "message": message,
        })
    }

    /// Page of ids `lo..=hi`, with a cursor below `lo` when older posts exist.
    fn page(&self, lo: u64, hi: u64) -> Value {
        let mut data: Vec<Value> = if hi == 0 {
            Vec::new()
        } else {
            (lo..=hi).map(|n| self.post(n)).collect()
        };
        if self.newest_first {
            data.reverse();
        }

        let mut page = json!({ "data": data });
        if hi > 0 && (lo > 1 || self.empty_tail) {
            page["paging"] = json!({
                "next": format!(
                    "https://graph.facebook.com/v2.3/{THREAD_ID}/comments?access_token=placeholder&limit={PAGE_SIZE}&until={lo}&__paging_token=enc_{lo}"
                )
            });
        }
        page
    }

    fn newest_page(&self) -> Value {
        if self.newest == 0 {
            return json!({ "data": [] });
        }
        let lo = self.newest.saturating_sub(PAGE_SIZE - 1).max(1);
        self.page(lo, self.newest)
    }

    fn page_until(&self, until: u64) -> Value {
        if until <= 1 {
            return json!({ "data": [] });
        }
        let hi = until - 1;
        let lo = until.saturating_sub(PAGE_SIZE).max(1);
        self.page(lo, hi)
    }

    fn roster(&self) -> Value {
        let members: Vec<Value> = (1..=self.roster)
            .map(|i| json!({"id": format!("u{i}"), "name": format!("User {i}")}))
            .collect();
        json!({ "data": members })
    }

    fn serve(&self, path: &str, params: &QueryParams) -> Result<Value> {
        match path {
            THREAD_ID => Ok(json!({
                "id": THREAD_ID,
                "to": self.roster(),
                "comments": self.newest_page(),
            })),
            "999/comments" => match params.get("until") {
                None => Ok(self.newest_page()),
                Some(u) => u
                    .parse::<u64>()
                    .map(|u| self.page_until(u))
                    .map_err(|_| Error::remote(RemoteFetchKind::Other, "bad until")),
            },
            _ => Err(Error::remote(RemoteFetchKind::Other, "Unsupported get request.")),
        }
    }
}

impl GraphTransport for MockGraph {
    async fn fetch_object(&self, path: &str, params: &QueryParams) -> Result<Value> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), params.clone()));

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.serve(path, params)
    }

    fn set_access_token(&mut self, token: String) {
        self.token = token;
    }
}
