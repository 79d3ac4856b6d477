//! Post and participant models.
//!
//! Posts are produced by the remote API and never mutated locally. Only the
//! fields threadsync reads are typed; everything else the API sends is kept
//! in `extra` so stored rows round-trip the full record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::PostIdentity;
use crate::error::Result;

/// Graph timestamp format, e.g. `2015-04-07T01:09:12+0000`.
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Author reference embedded in a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single comment in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Composite id `"<containerId>_<postId>"`. Natural key in storage.
    pub id: String,

    /// Raw creation timestamp as sent by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Author>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Any fields not modeled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Post {
    /// The ordering identity of this post.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the id is not `"<container>_<digits>"`.
    /// Posts that came through `CursorPage::parse` are already validated.
    pub fn identity(&self) -> Result<PostIdentity> {
        PostIdentity::from_composite(&self.id)
    }

    /// Creation time normalized to UTC.
    ///
    /// Accepts the Graph format (`+0000` offsets) and RFC 3339.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_time.as_deref()?;
        DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `http://` / `https://` links mentioned in the message.
    #[must_use]
    pub fn links(&self) -> Vec<&str> {
        self.message
            .as_deref()
            .map(|m| {
                m.split_whitespace()
                    .filter(|w| w.starts_with("http://") || w.starts_with("https://"))
                    .map(|w| w.trim_end_matches(['.', ',', ')', '!', '?']))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A member of the thread's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Participant {
    /// Name for display, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(json: serde_json::Value) -> Post {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let p = post(serde_json::json!({
            "id": "999_12",
            "created_time": "2015-04-07T01:09:12+0000",
            "from": {"id": "u1", "name": "Ada"},
            "message": "hi",
            "like_count": 3
        }));
        assert_eq!(p.from.as_ref().unwrap().name.as_deref(), Some("Ada"));
        assert_eq!(p.extra["like_count"], 3);

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["like_count"], 3);
        assert_eq!(back["id"], "999_12");
    }

    #[test]
    fn test_created_at_graph_format() {
        let p = post(serde_json::json!({"id": "1_1", "created_time": "2015-04-07T01:09:12+0000"}));
        assert_eq!(
            p.created_at(),
            Some(Utc.with_ymd_and_hms(2015, 4, 7, 1, 9, 12).unwrap())
        );
    }

    #[test]
    fn test_created_at_rfc3339_and_missing() {
        let p = post(serde_json::json!({"id": "1_1", "created_time": "2015-04-07T03:09:12+02:00"}));
        assert_eq!(
            p.created_at(),
            Some(Utc.with_ymd_and_hms(2015, 4, 7, 1, 9, 12).unwrap())
        );

        let p = post(serde_json::json!({"id": "1_1"}));
        assert_eq!(p.created_at(), None);
    }

    #[test]
    fn test_links() {
        let p = post(serde_json::json!({
            "id": "1_1",
            "message": "see https://example.com/a, and http://x.org. not ftp://y"
        }));
        assert_eq!(p.links(), vec!["https://example.com/a", "http://x.org"]);
    }

    #[test]
    fn test_participant_display_name() {
        let named = Participant { id: "7".into(), name: Some("Grace".into()) };
        let bare = Participant { id: "8".into(), name: None };
        assert_eq!(named.display_name(), "Grace");
        assert_eq!(bare.display_name(), "8");
    }
}
