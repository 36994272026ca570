//! # Session merge engine
//!
//! Folds a partial server record into the local session. Server records are
//! sparse (attachments stripped, fields omitted) and deliveries can repeat,
//! so merging is built around three rules:
//! - Present fields win, omitted fields keep the local value; accumulated
//!   stats survive any delivery that omits them
//! - Messages are unioned with the incoming copy first: a known non-user id
//!   is replaced in place (resolving processing placeholders), while user
//!   messages are never deduplicated — a repeated send is a real message
//! - Attachment bytes only exist locally, so user messages in the merged
//!   list recover them from a content-matching local message, and only when
//!   both sides are the same session
//!
//! The merge never fails; unusable input degrades to defaults upstream.

use examark_core::{Message, MessageId, Session, SessionPatch, DEFAULT_TITLE};
use examark_core::time;
use std::collections::{HashMap, HashSet};

/// Whether a delivery re-states what the local session already is.
///
/// Identity plus an equal `updatedAt` is the whole test; a patch without a
/// timestamp is never a no-op.
#[must_use]
pub fn is_noop(local: &Session, patch: &SessionPatch) -> bool {
    local.id == patch.id && patch.updated_at == Some(local.updated_at)
}

/// Merge a server delivery into the local session state.
///
/// `local` is `None` when nothing is held for the target session; the patch
/// then resolves against defaults. A detected no-op returns the local record
/// unchanged. Total: always produces a session.
#[must_use]
pub fn merge_session(local: Option<&Session>, patch: &SessionPatch) -> Session {
    if let Some(local) = local {
        if is_noop(local, patch) {
            return local.clone();
        }
    }

    let same_session = local.is_some_and(|l| l.id == patch.id);

    let base_stats = local.map(|l| l.stats.clone()).unwrap_or_default();
    let mut merged = Session {
        id: patch.id.clone(),
        title: resolve_title(local.map(|l| l.title.as_str()), patch.title.as_deref()),
        message_type: patch
            .message_type
            .clone()
            .or_else(|| local.and_then(|l| l.message_type.clone())),
        messages: match &patch.messages {
            Some(incoming) => reconcile_messages(
                incoming,
                local.map(|l| l.messages.as_slice()).unwrap_or_default(),
            ),
            None => local.map(|l| l.messages.clone()).unwrap_or_default(),
        },
        stats: match &patch.stats {
            Some(stats) => base_stats.overlay(stats),
            None => base_stats,
        },
        favorite: patch.favorite.unwrap_or(local.is_some_and(|l| l.favorite)),
        pinned: patch.pinned.unwrap_or(local.is_some_and(|l| l.pinned)),
        rating: patch.rating.or_else(|| local.and_then(|l| l.rating)),
        created_at: patch
            .created_at
            .or_else(|| local.map(|l| l.created_at))
            .unwrap_or_else(time::epoch),
        updated_at: patch
            .updated_at
            .or_else(|| local.map(|l| l.updated_at))
            .unwrap_or_else(time::epoch),
    };

    if same_session {
        if let Some(local) = local {
            carry_attachments(&mut merged.messages, &local.messages);
        }
    }

    merged
}

/// Title precedence: a real incoming title wins; the placeholder never
/// overwrites a real local title; blank assertions are ignored.
fn resolve_title(local: Option<&str>, incoming: Option<&str>) -> String {
    let local_is_real = local.is_some_and(|t| !t.trim().is_empty() && t != DEFAULT_TITLE);
    match incoming {
        Some(t) if t.trim().is_empty() => {}
        Some(DEFAULT_TITLE) if local_is_real => {}
        Some(t) => return t.to_owned(),
        None => {}
    }
    local
        .filter(|t| !t.trim().is_empty())
        .map_or_else(|| DEFAULT_TITLE.to_owned(), str::to_owned)
}

/// Union of incoming and local messages, incoming first.
///
/// Non-user messages are deduplicated by id keeping the first occurrence, so
/// the server's copy replaces the local one in place; user messages always
/// survive. The result is re-sorted ascending by timestamp (stable, so the
/// incoming copy stays ahead of a local twin with an equal timestamp).
fn reconcile_messages(incoming: &[Message], local: &[Message]) -> Vec<Message> {
    let mut seen: HashSet<&MessageId> = HashSet::new();
    let mut merged: Vec<Message> = Vec::with_capacity(incoming.len() + local.len());
    for message in incoming.iter().chain(local) {
        if message.role.is_user() || seen.insert(&message.id) {
            merged.push(message.clone());
        }
    }
    merged.sort_by_key(|m| m.timestamp);
    merged
}

/// Recover locally-held attachment bytes that the server stripped.
///
/// User messages without attachments adopt them from the first local user
/// message with identical content. Same-session merges only; the caller
/// enforces that.
fn carry_attachments(merged: &mut [Message], local: &[Message]) {
    let mut by_content: HashMap<&str, &Message> = HashMap::new();
    for message in local {
        if message.role.is_user() && message.has_attachments() {
            let _ = by_content.entry(message.content.as_str()).or_insert(message);
        }
    }
    if by_content.is_empty() {
        return;
    }

    for message in merged.iter_mut() {
        if message.role.is_user() && !message.has_attachments() {
            if let Some(source) = by_content.get(message.content.as_str()) {
                message.attachment_data.clone_from(&source.attachment_data);
                message
                    .attachment_data_array
                    .clone_from(&source.attachment_data_array);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
