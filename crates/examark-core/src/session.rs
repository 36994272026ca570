//! Session records and their partial wire forms.
//!
//! A [`Session`] is the fully-resolved local record. Server deliveries arrive
//! as [`SessionPatch`] — same shape, everything optional — and are folded in
//! by the merge engine (examark-sync). [`SessionUpdate`] is the small body
//! sent on explicit user edits (rename, favorite, pin, rate).

use crate::ids::SessionId;
use crate::message::Message;
use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to sessions the user has not named yet.
pub const DEFAULT_TITLE: &str = "New session";

fn default_title() -> String {
    DEFAULT_TITLE.to_owned()
}

/// Cost split for a session, in account currency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    /// Spend attributed to input tokens.
    #[serde(default)]
    pub input: f64,
    /// Spend attributed to output tokens.
    #[serde(default)]
    pub output: f64,
    /// Spend attributed to OCR of submitted attachments.
    #[serde(default)]
    pub ocr: f64,
}

/// Aggregate usage for a session.
///
/// The server accumulates these across jobs; the client only carries them
/// forward. Zero means "nothing recorded", which is why the partial form
/// ([`StatsPatch`]) exists — an omitted field must never reset a total.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Total tokens across all jobs in this session.
    #[serde(default)]
    pub total_tokens: u64,
    /// Input-side tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output-side tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Accumulated cost in account currency.
    #[serde(default)]
    pub total_cost: f64,
    /// Cost split by category.
    #[serde(default)]
    pub cost_breakdown: CostBreakdown,
    /// The model used by the most recent job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,
    /// Number of annotations produced across the session.
    #[serde(default)]
    pub annotation_count: u64,
}

/// Partial stats as delivered by the server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    /// See [`SessionStats::total_tokens`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// See [`SessionStats::input_tokens`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// See [`SessionStats::output_tokens`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// See [`SessionStats::total_cost`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// See [`SessionStats::cost_breakdown`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<CostBreakdown>,
    /// See [`SessionStats::last_model`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,
    /// See [`SessionStats::annotation_count`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_count: Option<u64>,
}

impl SessionStats {
    /// Overlay a partial delivery onto these stats, field by field.
    ///
    /// Present fields win; omitted fields keep the local value. The cost
    /// fields are re-asserted on their own at the end: an accumulated total
    /// survives any delivery that omits it.
    #[must_use]
    pub fn overlay(&self, patch: &StatsPatch) -> Self {
        let mut next = Self {
            total_tokens: patch.total_tokens.unwrap_or(self.total_tokens),
            input_tokens: patch.input_tokens.unwrap_or(self.input_tokens),
            output_tokens: patch.output_tokens.unwrap_or(self.output_tokens),
            total_cost: self.total_cost,
            cost_breakdown: self.cost_breakdown.clone(),
            last_model: patch.last_model.clone().or_else(|| self.last_model.clone()),
            annotation_count: patch.annotation_count.unwrap_or(self.annotation_count),
        };
        if let Some(cost) = patch.total_cost {
            next.total_cost = cost;
        }
        if let Some(breakdown) = &patch.cost_breakdown {
            next.cost_breakdown = breakdown.clone();
        }
        next
    }
}

/// A fully-resolved marking session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identity; `temp-` prefixed until server-acknowledged.
    pub id: SessionId,
    /// Display title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Server-side classification of the session's work. Opaque here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Conversation history, ascending by timestamp.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Aggregate usage.
    #[serde(default)]
    pub stats: SessionStats,
    /// User flag: favorite.
    #[serde(default)]
    pub favorite: bool,
    /// User flag: pinned to the top of the sidebar.
    #[serde(default)]
    pub pinned: bool,
    /// User rating of the marking result, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Creation time.
    #[serde(default = "time::epoch", with = "time::lenient_millis")]
    pub created_at: DateTime<Utc>,
    /// Last modification time; drives sidebar recency ordering.
    #[serde(default = "time::epoch", with = "time::lenient_millis")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh local session under a temporary identity.
    #[must_use]
    pub fn new_local(message_type: Option<String>) -> Self {
        let now = time::now();
        Self {
            id: SessionId::temporary(),
            title: default_title(),
            message_type,
            messages: Vec::new(),
            stats: SessionStats::default(),
            favorite: false,
            pinned: false,
            rating: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the title is still the unnamed-session placeholder.
    #[must_use]
    pub fn has_placeholder_title(&self) -> bool {
        self.title.trim().is_empty() || self.title == DEFAULT_TITLE
    }
}

/// A partial session record as delivered by the server.
///
/// Only `id` is required; every other field is "present means asserted".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    /// Target session identity (always permanent on server deliveries).
    /// The one required wire field: a record without it is unusable.
    pub id: SessionId,
    /// Asserted title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Asserted classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Asserted full message list (server view, attachments stripped).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Asserted stats fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsPatch>,
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
    /// Asserted modification time; equality with the local value makes the
    /// delivery a no-op.
    #[serde(
        default,
        with = "time::lenient_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    /// An empty patch targeting `id`.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl From<Session> for SessionPatch {
    /// A full-record patch asserting every field of `session`.
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            title: Some(session.title),
            message_type: session.message_type,
            messages: Some(session.messages),
            stats: Some(StatsPatch {
                total_tokens: Some(session.stats.total_tokens),
                input_tokens: Some(session.stats.input_tokens),
                output_tokens: Some(session.stats.output_tokens),
                total_cost: Some(session.stats.total_cost),
                cost_breakdown: Some(session.stats.cost_breakdown),
                last_model: session.stats.last_model,
                annotation_count: Some(session.stats.annotation_count),
            }),
            favorite: Some(session.favorite),
            pinned: Some(session.pinned),
            rating: session.rating,
            created_at: Some(session.created_at),
            updated_at: Some(session.updated_at),
        }
    }
}

/// Body of an explicit session edit (rename, favorite, pin, rate).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New favorite flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    /// New pinned flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// New rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl SessionUpdate {
    /// Whether the update asserts nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.favorite.is_none()
            && self.pinned.is_none()
            && self.rating.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
