//! Thread roster.
//!
//! The roster is always fetched in full and replaces the previous one
//! wholesale. There is no diffing and no versioning: membership changes are
//! rare and re-fetching is idempotent.

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{GraphTransport, QueryParams};
use crate::model::Participant;

/// Holds the last fetched roster for a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantTracker {
    roster: Vec<Participant>,
}

impl ParticipantTracker {
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.roster
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Last write wins.
    pub fn replace(&mut self, roster: Vec<Participant>) {
        self.roster = roster;
    }

    /// Extract `to.data` from a thread root object.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage { field: "to.data" }` if the roster is missing
    /// or an entry lacks an id.
    pub fn parse_roster(root: &serde_json::Value) -> Result<Vec<Participant>> {
        let data = root
            .get("to")
            .and_then(|to| to.get("data"))
            .ok_or_else(|| Error::malformed("to.data"))?;

        serde_json::from_value(data.clone()).map_err(|_| Error::malformed("to.data"))
    }

    /// Re-fetch the roster for `thread_id` and replace the current one.
    ///
    /// On failure the previous roster is left untouched.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and `MalformedPage`.
    pub async fn refresh<T: GraphTransport>(&mut self, transport: &T, thread_id: &str) -> Result<()> {
        let mut params = QueryParams::new();
        params.insert("fields".to_string(), "to".to_string());

        let root = transport.fetch_object(thread_id, &params).await?;
        let roster = Self::parse_roster(&root)?;
        debug!(thread_id, participants = roster.len(), "Roster refreshed");
        self.replace(roster);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mock::{MockGraph, THREAD_ID};
    use crate::error::RemoteFetchKind;
    use serde_json::json;

    #[test]
    fn test_parse_roster() {
        let roster = ParticipantTracker::parse_roster(&json!({
            "to": {"data": [{"id": "1", "name": "Ada"}, {"id": "2"}]}
        }))
        .unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].name, None);
    }

    #[test]
    fn test_parse_roster_missing() {
        let err = ParticipantTracker::parse_roster(&json!({"comments": {}})).unwrap_err();
        assert!(matches!(err, Error::MalformedPage { ref field } if field == "to.data"));

        let err = ParticipantTracker::parse_roster(&json!({"to": {"data": [{"name": "x"}]}})).unwrap_err();
        assert!(matches!(err, Error::MalformedPage { .. }));
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let mut mock = MockGraph::new();
        let mut tracker = ParticipantTracker::default();

        tracker.refresh(&mock, THREAD_ID).await.unwrap();
        assert_eq!(tracker.len(), 8);

        mock.use_full_update_order();
        tracker.refresh(&mock, THREAD_ID).await.unwrap();
        assert_eq!(tracker.len(), 9);

        mock.use_partial_update_order();
        tracker.refresh(&mock, THREAD_ID).await.unwrap();
        assert_eq!(tracker.len(), 7);
        assert!(tracker.participants().iter().all(|p| p.id != "u8"));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_roster() {
        let mock = MockGraph::new();
        let mut tracker = ParticipantTracker::default();
        tracker.refresh(&mock, THREAD_ID).await.unwrap();

        mock.fail_next_with(RemoteFetchKind::Timeout);
        let err = tracker.refresh(&mock, THREAD_ID).await.unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteFetchKind::Timeout));
        assert_eq!(tracker.len(), 8);
    }
}
