//! Sidebar projections of sessions.
//!
//! The sidebar never holds full sessions; it holds [`SessionSummary`] rows —
//! identity, title, flags, recency, and a one-line preview of the latest
//! real message. Summaries are kept current from two directions: full
//! projections of merged sessions, and partial [`SummaryPatch`] assertions
//! (for example an optimistic pin toggle).

use crate::ids::SessionId;
use crate::message::Message;
use crate::session::{Session, DEFAULT_TITLE};
use crate::text::{single_line, truncate_chars};
use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default character budget for the `last_message` preview.
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 120;

fn default_title() -> String {
    DEFAULT_TITLE.to_owned()
}

/// The sidebar's view of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identity (always permanent; temporary sessions are not listed).
    pub id: SessionId,
    /// Display title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Server-side classification, carried opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// One-line preview of the most recent real message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// User flag: favorite.
    #[serde(default)]
    pub favorite: bool,
    /// User flag: pinned.
    #[serde(default)]
    pub pinned: bool,
    /// User rating, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Creation time.
    #[serde(default = "time::epoch", with = "time::lenient_millis")]
    pub created_at: DateTime<Utc>,
    /// Last modification time; drives recency ordering.
    #[serde(default = "time::epoch", with = "time::lenient_millis")]
    pub updated_at: DateTime<Utc>,
}

/// A partial summary assertion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPatch {
    /// Target session identity.
    pub id: SessionId,
    /// Asserted title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Asserted classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Asserted preview line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Asserted favorite flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    /// Asserted pinned flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// Asserted rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Asserted creation time.
    #[serde(
        default,
        with = "time::lenient_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Asserted modification time.
    #[serde(
        default,
        with = "time::lenient_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SummaryPatch {
    /// An empty patch targeting `id`.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl SessionSummary {
    /// Build a brand-new entry from a partial assertion, defaulting the rest.
    #[must_use]
    pub fn from_patch(patch: &SummaryPatch) -> Self {
        Self {
            id: patch.id.clone(),
            title: patch.title.clone().unwrap_or_else(default_title),
            message_type: patch.message_type.clone(),
            last_message: patch.last_message.clone(),
            favorite: patch.favorite.unwrap_or(false),
            pinned: patch.pinned.unwrap_or(false),
            rating: patch.rating,
            created_at: patch.created_at.unwrap_or_else(time::epoch),
            updated_at: patch.updated_at.unwrap_or_else(time::epoch),
        }
    }

    /// Fold a partial assertion into this entry. Present fields win, omitted
    /// fields keep their value. The caller matches ids before applying.
    pub fn apply(&mut self, patch: &SummaryPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(message_type) = &patch.message_type {
            self.message_type = Some(message_type.clone());
        }
        if let Some(last_message) = &patch.last_message {
            self.last_message = Some(last_message.clone());
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Preview of the most recent message holding real content.
///
/// Processing placeholders and blank messages are skipped; the survivor is
/// flattened to a single line and truncated to `max_chars`.
#[must_use]
pub fn last_message_preview(messages: &[Message], max_chars: usize) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| !m.is_processing && !m.content.trim().is_empty())
        .map(|m| truncate_chars(&single_line(&m.content), max_chars))
}

/// Full sidebar projection of a session, preview recomputed.
#[must_use]
pub fn project_summary(session: &Session, preview_max_chars: usize) -> SessionSummary {
    SessionSummary {
        id: session.id.clone(),
        title: session.title.clone(),
        message_type: session.message_type.clone(),
        last_message: last_message_preview(&session.messages, preview_max_chars),
        favorite: session.favorite,
        pinned: session.pinned,
        rating: session.rating,
        created_at: session.created_at,
        updated_at: session.updated_at,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;
    use crate::message::Role;

    fn msg(id: &str, role: Role, content: &str, processing: bool, at_ms: i64) -> Message {
        Message {
            id: MessageId::from(id),
            role,
            content: content.to_owned(),
            attachment_data: None,
            attachment_data_array: None,
            is_processing: processing,
            timestamp: time::from_millis(at_ms),
        }
    }

    #[test]
    fn preview_takes_most_recent_real_message() {
        let messages = vec![
            msg("m1", Role::User, "first question", false, 1_000),
            msg("m2", Role::Assistant, "the answer", false, 2_000),
            msg("m3", Role::Assistant, "", true, 3_000),
        ];
        assert_eq!(
            last_message_preview(&messages, 120).as_deref(),
            Some("the answer")
        );
    }

    #[test]
    fn preview_skips_blank_content() {
        let messages = vec![
            msg("m1", Role::User, "real content", false, 1_000),
            msg("m2", Role::Assistant, "   \n ", false, 2_000),
        ];
        assert_eq!(
            last_message_preview(&messages, 120).as_deref(),
            Some("real content")
        );
    }

    #[test]
    fn preview_is_none_without_real_messages() {
        assert!(last_message_preview(&[], 120).is_none());
        let only_placeholder = vec![msg("m1", Role::Assistant, "", true, 1_000)];
        assert!(last_message_preview(&only_placeholder, 120).is_none());
    }

    #[test]
    fn preview_flattens_and_truncates() {
        let long = "line one\nline two ".repeat(20);
        let messages = vec![msg("m1", Role::Assistant, &long, false, 1_000)];
        let preview = last_message_preview(&messages, 20).unwrap();
        assert!(!preview.contains('\n'));
        assert_eq!(preview.chars().count(), 21); // 20 + ellipsis
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn projection_copies_flags_and_recency() {
        let mut session = Session::new_local(Some("marking".to_owned()));
        session.id = SessionId::from("sess-9");
        session.title = "Essay draft".to_owned();
        session.pinned = true;
        session.rating = Some(5);
        session.messages.push(msg("m1", Role::User, "mark my essay", false, 1_000));
        let summary = project_summary(&session, 120);
        assert_eq!(summary.id.as_str(), "sess-9");
        assert_eq!(summary.title, "Essay draft");
        assert!(summary.pinned);
        assert_eq!(summary.rating, Some(5));
        assert_eq!(summary.last_message.as_deref(), Some("mark my essay"));
        assert_eq!(summary.updated_at, session.updated_at);
    }

    #[test]
    fn from_patch_fills_defaults() {
        let patch = SummaryPatch {
            pinned: Some(true),
            ..SummaryPatch::new(SessionId::from("sess-1"))
        };
        let summary = SessionSummary::from_patch(&patch);
        assert_eq!(summary.title, DEFAULT_TITLE);
        assert!(summary.pinned);
        assert!(!summary.favorite);
        assert_eq!(summary.updated_at, time::epoch());
    }

    #[test]
    fn apply_overlays_present_fields_only() {
        let mut summary = SessionSummary::from_patch(&SummaryPatch {
            title: Some("Chemistry lab".to_owned()),
            favorite: Some(true),
            updated_at: Some(time::from_millis(5_000)),
            ..SummaryPatch::new(SessionId::from("sess-2"))
        });
        summary.apply(&SummaryPatch {
            pinned: Some(true),
            updated_at: Some(time::from_millis(9_000)),
            ..SummaryPatch::new(SessionId::from("sess-2"))
        });
        assert_eq!(summary.title, "Chemistry lab");
        assert!(summary.favorite);
        assert!(summary.pinned);
        assert_eq!(summary.updated_at.timestamp_millis(), 9_000);
    }

    #[test]
    fn summary_wire_shape() {
        let summary = SessionSummary::from_patch(&SummaryPatch {
            last_message: Some("done".to_owned()),
            ..SummaryPatch::new(SessionId::from("sess-3"))
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["lastMessage"], "done");
        assert!(json["updatedAt"].is_i64());
        assert!(json.get("rating").is_none());
    }
}
