//! # Summary cache
//!
//! The bounded sidebar cache. Holds at most `capacity` summaries, ordered
//! pinned-first and most-recently-updated within each group; whatever falls
//! past the bound after a re-sort is evicted, so pinned entries survive
//! preferentially. Upserts merge field-wise — a partial assertion (say, an
//! optimistic pin toggle) never erases fields it does not mention. Sessions
//! under a temporary identity are rejected outright: they would turn into
//! ghost rows once the permanent id arrives.

use examark_core::summary::DEFAULT_PREVIEW_MAX_CHARS;
use examark_core::{
    last_message_preview, project_summary, Session, SessionId, SessionPatch, SessionSummary,
    SummaryPatch,
};
use tracing::debug;

/// Default bound on cached summaries.
pub const DEFAULT_SUMMARY_CAPACITY: usize = 50;

/// Bounded, ordered collection of sidebar summaries.
#[derive(Debug)]
pub struct SummaryCache {
    entries: Vec<SessionSummary>,
    capacity: usize,
    preview_max_chars: usize,
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryCache {
    /// Cache with the default capacity and preview budget.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_SUMMARY_CAPACITY, DEFAULT_PREVIEW_MAX_CHARS)
    }

    /// Cache with explicit limits.
    #[must_use]
    pub fn with_limits(capacity: usize, preview_max_chars: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(64)),
            capacity,
            preview_max_chars,
        }
    }

    /// Merge a partial assertion into the cache.
    ///
    /// Creates the entry when absent (unmentioned fields default), otherwise
    /// overlays the asserted fields. Returns false for temporary ids.
    pub fn upsert(&mut self, patch: &SummaryPatch) -> bool {
        if patch.id.is_temporary() {
            debug!(session_id = %patch.id, "temporary session rejected by summary cache");
            return false;
        }
        self.apply(patch);
        self.restore_order();
        true
    }

    /// Replace (or create) an entry from a full session record, with the
    /// preview recomputed from its messages.
    pub fn upsert_session(&mut self, session: &Session) -> bool {
        if session.id.is_temporary() {
            debug!(session_id = %session.id, "temporary session rejected by summary cache");
            return false;
        }
        let summary = project_summary(session, self.preview_max_chars);
        match self.entries.iter_mut().find(|e| e.id == session.id) {
            Some(entry) => *entry = summary,
            None => self.entries.push(summary),
        }
        self.restore_order();
        true
    }

    /// Merge a server session record: only the fields it asserts, with the
    /// preview recomputed when it carries messages.
    pub fn upsert_record(&mut self, patch: &SessionPatch) -> bool {
        if patch.id.is_temporary() {
            debug!(session_id = %patch.id, "temporary session rejected by summary cache");
            return false;
        }
        self.apply(&summary_assertion(patch, self.preview_max_chars));
        self.restore_order();
        true
    }

    /// Merge a batch of assertions with a single re-sort at the end.
    ///
    /// Returns how many were accepted (temporary ids are skipped).
    pub fn upsert_batch(&mut self, patches: &[SummaryPatch]) -> usize {
        let mut accepted = 0;
        for patch in patches {
            if patch.id.is_temporary() {
                debug!(session_id = %patch.id, "temporary session rejected by summary cache");
                continue;
            }
            self.apply(patch);
            accepted += 1;
        }
        if accepted > 0 {
            self.restore_order();
        }
        accepted
    }

    /// Drop an entry. Returns whether it existed.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != *id);
        self.entries.len() != before
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&SessionSummary> {
        self.entries.iter().find(|e| e.id == *id)
    }

    /// The entries in display order: pinned first, then newest first.
    #[must_use]
    pub fn entries(&self) -> &[SessionSummary] {
        &self.entries
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn apply(&mut self, patch: &SummaryPatch) {
        match self.entries.iter_mut().find(|e| e.id == patch.id) {
            Some(entry) => entry.apply(patch),
            None => self.entries.push(SessionSummary::from_patch(patch)),
        }
    }

    fn restore_order(&mut self) {
        self.entries
            .sort_by(|a, b| b.pinned.cmp(&a.pinned).then(b.updated_at.cmp(&a.updated_at)));
        self.entries.truncate(self.capacity);
    }
}

/// The summary-relevant assertions of a server session record.
fn summary_assertion(patch: &SessionPatch, preview_max_chars: usize) -> SummaryPatch {
    SummaryPatch {
        id: patch.id.clone(),
        title: patch.title.clone(),
        message_type: patch.message_type.clone(),
        last_message: patch
            .messages
            .as_deref()
            .and_then(|messages| last_message_preview(messages, preview_max_chars)),
        favorite: patch.favorite,
        pinned: patch.pinned,
        rating: patch.rating,
        created_at: patch.created_at,
        updated_at: patch.updated_at,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use examark_core::time;

    fn patch(id: &str, updated_ms: i64) -> SummaryPatch {
        SummaryPatch {
            updated_at: Some(time::from_millis(updated_ms)),
            ..SummaryPatch::new(SessionId::from(id))
        }
    }

    #[test]
    fn temporary_ids_are_rejected() {
        let mut cache = SummaryCache::new();
        let temp = SummaryPatch::new(SessionId::temporary());
        assert!(!cache.upsert(&temp));
        assert!(cache.is_empty());

        let session = Session::new_local(None);
        assert!(!cache.upsert_session(&session));
        assert!(cache.is_empty());
    }

    #[test]
    fn upsert_creates_then_merges() {
        let mut cache = SummaryCache::new();
        assert!(cache.upsert(&SummaryPatch {
            title: Some("Essay".to_owned()),
            ..patch("sess-1", 1_000)
        }));
        assert_eq!(cache.len(), 1);

        // A pin-only assertion keeps the title.
        assert!(cache.upsert(&SummaryPatch {
            pinned: Some(true),
            ..patch("sess-1", 2_000)
        }));
        assert_eq!(cache.len(), 1);
        let entry = cache.get(&SessionId::from("sess-1")).unwrap();
        assert_eq!(entry.title, "Essay");
        assert!(entry.pinned);
        assert_eq!(entry.updated_at.timestamp_millis(), 2_000);
    }

    #[test]
    fn order_is_pinned_first_then_recency() {
        let mut cache = SummaryCache::new();
        let _ = cache.upsert(&patch("old", 1_000));
        let _ = cache.upsert(&patch("new", 9_000));
        let _ = cache.upsert(&SummaryPatch {
            pinned: Some(true),
            ..patch("pinned-old", 500)
        });
        let ids: Vec<&str> = cache.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["pinned-old", "new", "old"]);
    }

    #[test]
    fn capacity_bound_evicts_the_tail() {
        let mut cache = SummaryCache::with_limits(3, 120);
        for i in 0..5 {
            let _ = cache.upsert(&patch(&format!("sess-{i}"), i64::from(i) * 1_000));
        }
        assert_eq!(cache.len(), 3);
        let ids: Vec<&str> = cache.entries().iter().map(|e| e.id.as_str()).collect();
        // Newest three survive.
        assert_eq!(ids, vec!["sess-4", "sess-3", "sess-2"]);
    }

    #[test]
    fn default_capacity_holds_exactly_fifty() {
        let mut cache = SummaryCache::new();
        let _ = cache.upsert(&SummaryPatch {
            pinned: Some(true),
            ..patch("pinned-0", 0)
        });
        for i in 1..60 {
            let _ = cache.upsert(&patch(&format!("sess-{i}"), i64::from(i) * 1_000));
        }
        assert_eq!(cache.len(), DEFAULT_SUMMARY_CAPACITY);
        // Pinned entry leads despite being the oldest.
        assert_eq!(cache.entries()[0].id.as_str(), "pinned-0");
    }

    #[test]
    fn pinned_entries_survive_eviction() {
        let mut cache = SummaryCache::with_limits(3, 120);
        let _ = cache.upsert(&SummaryPatch {
            pinned: Some(true),
            ..patch("keeper", 100)
        });
        for i in 0..4 {
            let _ = cache.upsert(&patch(&format!("sess-{i}"), 1_000 + i64::from(i)));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&SessionId::from("keeper")).is_some());
    }

    #[test]
    fn batch_upsert_accepts_and_orders_once() {
        let mut cache = SummaryCache::new();
        let accepted = cache.upsert_batch(&[
            patch("b", 2_000),
            patch("a", 3_000),
            SummaryPatch::new(SessionId::temporary()),
            patch("c", 1_000),
        ]);
        assert_eq!(accepted, 3);
        let ids: Vec<&str> = cache.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn upsert_session_replaces_wholesale() {
        let mut cache = SummaryCache::new();
        let _ = cache.upsert(&SummaryPatch {
            title: Some("Stale".to_owned()),
            last_message: Some("old preview".to_owned()),
            ..patch("sess-1", 1_000)
        });

        let mut session = Session::new_local(None);
        session.id = SessionId::from("sess-1");
        session.title = "Fresh".to_owned();
        session.updated_at = time::from_millis(2_000);
        assert!(cache.upsert_session(&session));

        let entry = cache.get(&SessionId::from("sess-1")).unwrap();
        assert_eq!(entry.title, "Fresh");
        // No messages in the session: the preview really is gone.
        assert!(entry.last_message.is_none());
    }

    #[test]
    fn upsert_record_merges_only_asserted_fields() {
        let mut cache = SummaryCache::new();
        let _ = cache.upsert(&SummaryPatch {
            title: Some("Kept title".to_owned()),
            last_message: Some("kept preview".to_owned()),
            ..patch("sess-1", 1_000)
        });

        let record = SessionPatch {
            pinned: Some(true),
            updated_at: Some(time::from_millis(2_000)),
            ..SessionPatch::new(SessionId::from("sess-1"))
        };
        assert!(cache.upsert_record(&record));

        let entry = cache.get(&SessionId::from("sess-1")).unwrap();
        assert_eq!(entry.title, "Kept title");
        assert_eq!(entry.last_message.as_deref(), Some("kept preview"));
        assert!(entry.pinned);
        assert_eq!(entry.updated_at.timestamp_millis(), 2_000);
    }

    #[test]
    fn remove_drops_the_entry() {
        let mut cache = SummaryCache::new();
        let _ = cache.upsert(&patch("sess-1", 1_000));
        assert!(cache.remove(&SessionId::from("sess-1")));
        assert!(!cache.remove(&SessionId::from("sess-1")));
        assert!(cache.is_empty());
    }
}
