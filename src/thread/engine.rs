//! Thread synchronization engine.
//!
//! Keeps a local view of one comment thread in step with the remote API:
//!
//! - **Backfill** (`advance_page`) walks continuation cursors toward the
//!   beginning of the thread, prepending each older page.
//! - **Catch-up** (`sync_incremental`) fetches the newest page and, when a
//!   gap to the previously seen high-water-mark remains, keeps paging
//!   backward until it overlaps what was already synced. Only posts newer
//!   than the boundary are merged.
//!
//! ```text
//!            fetch newest page
//!   ┌──────┐ ─────────────────────► hwm unchanged ──► Idle, false
//!   │ Idle │                        page reaches boundary ──► merge newer, Idle, true
//!   └──────┘                        gap remains ──┐
//!      ▲                                          ▼
//!      │ overlap / no older page        ┌────────────┐
//!      └─────────────────────────────── │ CatchingUp │ ◄─┐ follow cursor,
//!                                       └────────────┘ ──┘ merge page, true
//! ```
//!
//! Every operation fetches first and mutates only after the fetch and the
//! page parse succeeded, so a failed step can be re-issued as-is.
//!
//! Methods take `&mut self`: one writer per thread, one request in flight.

use std::collections::HashSet;

use tracing::{debug, info};

use super::participants::ParticipantTracker;
use crate::error::Result;
use crate::graph::{Cursor, CursorPage, GraphTransport, Paginator, QueryParams};
use crate::model::{Participant, Post, PostIdentity};

/// Where the catch-up state machine is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    CatchingUp {
        /// High-water-mark at the start of this catch-up. `None` when nothing
        /// had been seen before (empty thread at initialization).
        boundary: Option<PostIdentity>,
        /// Continuation of the last catch-up page.
        cursor: Cursor,
    },
}

/// Synchronization state of one thread.
#[derive(Debug, Clone)]
pub struct ThreadSyncState {
    thread_id: String,
    participants: ParticipantTracker,
    posts: Vec<Post>,
    buffered: HashSet<PostIdentity>,
    high_water_mark: Option<PostIdentity>,
    phase: SyncPhase,
    backfill_cursor: Option<Cursor>,
}

impl ThreadSyncState {
    fn new(thread_id: String, high_water_mark: Option<PostIdentity>) -> Self {
        Self {
            thread_id,
            participants: ParticipantTracker::default(),
            posts: Vec::new(),
            buffered: HashSet::new(),
            high_water_mark,
            phase: SyncPhase::Idle,
            backfill_cursor: None,
        }
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        self.participants.participants()
    }

    /// Buffered posts: backfilled pages first (oldest page at the front),
    /// then the initial page, then catch-up merges in fetch order.
    /// Sort by `Post::identity` for chronological order.
    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Identity of the newest post seen by the last newest-page fetch.
    #[must_use]
    pub fn high_water_mark(&self) -> Option<&PostIdentity> {
        self.high_water_mark.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    #[must_use]
    pub fn is_catching_up(&self) -> bool {
        matches!(self.phase, SyncPhase::CatchingUp { .. })
    }

    /// Boundary of the running catch-up. Always `None` when idle.
    #[must_use]
    pub fn catch_up_boundary(&self) -> Option<&PostIdentity> {
        match &self.phase {
            SyncPhase::CatchingUp { boundary, .. } => boundary.as_ref(),
            SyncPhase::Idle => None,
        }
    }

    /// Cursor the next `advance_page` will follow.
    #[must_use]
    pub fn backfill_cursor(&self) -> Option<&Cursor> {
        self.backfill_cursor.as_ref()
    }

    /// Drop posts already in the buffer and record the rest.
    fn unseen(&mut self, items: impl IntoIterator<Item = Post>) -> Vec<Post> {
        items
            .into_iter()
            .filter(|post| match post.identity() {
                Ok(id) => self.buffered.insert(id),
                Err(_) => false,
            })
            .collect()
    }

    fn append(&mut self, items: impl IntoIterator<Item = Post>) -> usize {
        let fresh = self.unseen(items);
        let n = fresh.len();
        self.posts.extend(fresh);
        n
    }

    fn prepend(&mut self, items: impl IntoIterator<Item = Post>) -> usize {
        let fresh = self.unseen(items);
        let n = fresh.len();
        self.posts.splice(0..0, fresh);
        n
    }

    fn drain(&mut self) -> Vec<Post> {
        self.buffered.clear();
        std::mem::take(&mut self.posts)
    }
}

/// Drives backfill and catch-up for one thread against a transport.
pub struct ThreadSyncEngine<T: GraphTransport> {
    paginator: Paginator<T>,
    state: ThreadSyncState,
}

impl<T: GraphTransport> ThreadSyncEngine<T> {
    /// An engine with no state yet. Call [`Self::initialize`] before backfilling.
    pub fn new(transport: T, thread_id: impl Into<String>) -> Self {
        Self {
            paginator: Paginator::new(transport),
            state: ThreadSyncState::new(thread_id.into(), None),
        }
    }

    /// Resume a session from a known high-water-mark (typically the most
    /// recently stored post id) without refetching the thread.
    pub fn resume(transport: T, thread_id: impl Into<String>, high_water_mark: PostIdentity) -> Self {
        Self {
            paginator: Paginator::new(transport),
            state: ThreadSyncState::new(thread_id.into(), Some(high_water_mark)),
        }
    }

    /// `new` followed by `initialize`.
    ///
    /// # Errors
    ///
    /// See [`Self::initialize`].
    pub async fn open(transport: T, thread_id: impl Into<String>) -> Result<Self> {
        let mut engine = Self::new(transport, thread_id);
        engine.initialize().await?;
        Ok(engine)
    }

    /// Fetch the thread root: roster plus the newest page of comments.
    ///
    /// Resets the buffer to that page and sets the high-water-mark to its
    /// newest post. The page's cursor becomes the backfill cursor.
    ///
    /// # Errors
    ///
    /// `RemoteFetch` on transport failure, `MalformedPage` if the root lacks
    /// `to.data` or `comments.data`.
    pub async fn initialize(&mut self) -> Result<()> {
        let root = self
            .paginator
            .transport()
            .fetch_object(&self.state.thread_id, &QueryParams::new())
            .await?;
        let roster = ParticipantTracker::parse_roster(&root)?;
        let CursorPage { items, next } = CursorPage::parse_embedded(&root, "comments")?;
        let newest = items.iter().filter_map(|p| p.identity().ok()).max();

        let state = &mut self.state;
        state.participants.replace(roster);
        state.posts.clear();
        state.buffered.clear();
        state.append(items);
        state.high_water_mark = newest;
        state.phase = SyncPhase::Idle;
        state.backfill_cursor = next;

        info!(
            thread_id = %state.thread_id,
            posts = state.posts.len(),
            participants = state.participants.len(),
            high_water_mark = ?state.high_water_mark.as_ref().map(PostIdentity::as_str),
            "Thread initialized"
        );
        Ok(())
    }

    /// Fetch the next older page and prepend it to the buffer.
    ///
    /// Returns `false`, without a request or any mutation, once the oldest
    /// page has been reached. The high-water-mark is not affected.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn advance_page(&mut self) -> Result<bool> {
        let Some(page) = self.paginator.advance(self.state.backfill_cursor.as_ref()).await? else {
            debug!(thread_id = %self.state.thread_id, "Backfill reached the oldest page");
            return Ok(false);
        };

        let CursorPage { items, next } = page;
        let added = self.state.prepend(items);
        self.state.backfill_cursor = next;

        debug!(
            thread_id = %self.state.thread_id,
            added,
            buffered = self.state.posts.len(),
            "Backfilled page"
        );
        Ok(true)
    }

    /// One step of the catch-up state machine.
    ///
    /// Returns `true` when posts were merged (or a catch-up just ended) and
    /// another call may find more; `false` once the thread has nothing newer
    /// than the high-water-mark and catch-up has settled.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`. State is unchanged
    /// on error.
    pub async fn sync_incremental(&mut self) -> Result<bool> {
        let (page, boundary, from_idle) = match &self.state.phase {
            SyncPhase::Idle => {
                let path = comments_path(&self.state.thread_id);
                let page = self.paginator.fetch_first(&path).await?;
                (page, self.state.high_water_mark.clone(), true)
            }
            SyncPhase::CatchingUp { boundary, cursor } => {
                let page = self.paginator.follow(cursor).await?;
                (page, boundary.clone(), false)
            }
        };

        if from_idle {
            // An empty newest page says nothing about the mark; keep it.
            if let Some(newest) = page.newest_identity() {
                self.state.high_water_mark = Some(newest);
            }
        }

        if self.state.high_water_mark == boundary {
            self.state.phase = SyncPhase::Idle;
            debug!(thread_id = %self.state.thread_id, "No new posts");
            return Ok(false);
        }

        let oldest = page.oldest_identity();
        let overlaps = match (&boundary, &oldest) {
            (Some(b), Some(o)) => b >= o,
            // Nothing older to walk toward.
            (_, None) => true,
            (None, Some(_)) => false,
        };

        let CursorPage { items, next } = page;
        let merged = if overlaps {
            let newer = items.into_iter().filter(|post| {
                post.identity()
                    .is_ok_and(|id| boundary.as_ref().is_none_or(|b| id > *b))
            });
            self.state.append(newer)
        } else {
            self.state.append(items)
        };

        self.state.phase = match next {
            Some(cursor) if !overlaps => SyncPhase::CatchingUp { boundary, cursor },
            _ => SyncPhase::Idle,
        };

        info!(
            thread_id = %self.state.thread_id,
            merged,
            catching_up = self.state.is_catching_up(),
            "Catch-up step"
        );
        Ok(true)
    }

    /// Re-fetch the roster and replace it.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn update_participants(&mut self) -> Result<()> {
        self.state
            .participants
            .refresh(self.paginator.transport(), &self.state.thread_id)
            .await
    }

    /// Take the buffered posts, leaving the buffer empty.
    ///
    /// The high-water-mark and catch-up state are untouched, so syncing
    /// continues from the same position.
    pub fn drain_posts(&mut self) -> Vec<Post> {
        self.state.drain()
    }

    /// Swap the credential used for subsequent requests.
    pub fn change_credential(&mut self, token: String) {
        self.paginator.transport_mut().set_access_token(token);
    }

    #[must_use]
    pub fn state(&self) -> &ThreadSyncState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        self.paginator.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.paginator.transport_mut()
    }
}

/// The comments edge of a thread; always the newest page when fetched without a cursor.
fn comments_path(thread_id: &str) -> String {
    format!("{thread_id}/comments")
}
