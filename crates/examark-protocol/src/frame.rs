//! # Frame interpreter
//!
//! Classifies decoded lines into typed frames. Event-bearing lines carry a
//! `data:` prefix and a JSON payload; everything else (blank lines, comments,
//! other fields) is skipped. Payloads are matched against the known shapes in
//! priority order — progress, completion, error — and anything else that is
//! still valid JSON is forwarded as [`Frame::Unknown`] so a consumer can
//! decide. Unparsable payloads are logged and dropped; a bad frame never
//! kills the stream.

use examark_core::text::truncate_chars;
use examark_core::SessionPatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A progress tick: where the job is in its step plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFrame {
    /// Human-readable label of the step now running.
    pub step: String,
    /// The full step plan, in order.
    pub steps: Vec<String>,
    /// Index of the running step within `steps`.
    pub current_step: u32,
    /// Whether the plan has finished.
    pub complete: bool,
}

/// The terminal frame of a successful job: the server's merged session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionFrame {
    /// The authoritative session record produced by the job.
    pub unified_session: SessionPatch,
}

/// A typed failure emitted by the server mid-stream.
///
/// Stays snake_case on the wire: the exhaustion flag is literally
/// `credits_exhausted` in the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Human-readable failure description.
    pub error: String,
    /// True when the account ran out of marking credits.
    #[serde(default)]
    pub credits_exhausted: bool,
}

/// One interpreted stream event. Decided here, matched everywhere else.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Step-plan progress tick.
    Progress(ProgressFrame),
    /// Terminal success carrying the unified session.
    Completion(CompletionFrame),
    /// Typed server failure.
    Error(ErrorFrame),
    /// Valid JSON that matches no known shape; forwarded best-effort.
    Unknown(Value),
}

impl Frame {
    /// Short label for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Completion(_) => "completion",
            Self::Error(_) => "error",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Extract the event payload from a line.
///
/// Returns `Some(payload)` for `data:` lines with non-empty content, `None`
/// for blank lines, comments, and any other field.
fn extract_event_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();

    // Skip empty lines and comments
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let payload = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?;

    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    Some(payload)
}

/// Interpret one decoded line.
///
/// `None` means the line carries nothing for the consumer — it was not an
/// event line, or its payload was unusable (logged and skipped).
pub fn interpret_line(line: &str) -> Option<Frame> {
    let payload = extract_event_payload(line)?;

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                error = %e,
                payload_preview = truncate_chars(payload, 100),
                "skipping unparsable event payload"
            );
            return None;
        }
    };

    classify(value)
}

/// Match a payload against the known shapes, in priority order.
fn classify(value: Value) -> Option<Frame> {
    // Progress frames carry no discriminator; they are recognized by shape.
    if let Ok(progress) = serde_json::from_value::<ProgressFrame>(value.clone()) {
        return Some(Frame::Progress(progress));
    }

    match value.get("type").and_then(Value::as_str) {
        Some("complete") => match serde_json::from_value::<CompletionFrame>(value) {
            Ok(completion) => Some(Frame::Completion(completion)),
            Err(e) => {
                warn!(error = %e, "skipping malformed completion frame");
                None
            }
        },
        Some("error") => match serde_json::from_value::<ErrorFrame>(value) {
            Ok(error) => Some(Frame::Error(error)),
            Err(e) => {
                warn!(error = %e, "skipping malformed error frame");
                None
            }
        },
        _ => Some(Frame::Unknown(value)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
