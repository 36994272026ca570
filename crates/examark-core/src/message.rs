//! Message records.

use crate::ids::MessageId;
use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The account submitting work to be marked.
    User,
    /// The marking engine's reply.
    Assistant,
}

impl Role {
    /// Whether this is a user-authored message.
    #[must_use]
    pub fn is_user(self) -> bool {
        matches!(self, Self::User)
    }
}

/// A single message within a session.
///
/// `attachment_data` / `attachment_data_array` hold locally-supplied
/// submission bytes (base64). Server copies of the same message omit them,
/// so merging carries them forward from the local record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable message identity (client-minted for optimistic records).
    pub id: MessageId,
    /// Author role.
    pub role: Role,
    /// Message text; empty while the message is a processing placeholder.
    #[serde(default)]
    pub content: String,
    /// Base64 payload of a single locally-held attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_data: Option<String>,
    /// Base64 payloads when a submission carries several attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_data_array: Option<Vec<String>>,
    /// True while this is a placeholder awaiting the server's final text.
    #[serde(default)]
    pub is_processing: bool,
    /// When the message was produced; epoch if the wire value was unusable.
    #[serde(default = "time::epoch", with = "time::lenient_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A user message created locally at submit time.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            attachment_data: None,
            attachment_data_array: None,
            is_processing: false,
            timestamp: time::now(),
        }
    }

    /// The assistant placeholder shown while a job streams.
    #[must_use]
    pub fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            attachment_data: None,
            attachment_data_array: None,
            is_processing: true,
            timestamp: time::now(),
        }
    }

    /// Attach a single base64 payload (builder style).
    #[must_use]
    pub fn with_attachment(mut self, data: impl Into<String>) -> Self {
        self.attachment_data = Some(data.into());
        self
    }

    /// Attach several base64 payloads (builder style).
    #[must_use]
    pub fn with_attachments(mut self, data: Vec<String>) -> Self {
        self.attachment_data_array = Some(data);
        self
    }

    /// Whether this message holds any attachment bytes.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        self.attachment_data.is_some()
            || self
                .attachment_data_array
                .as_ref()
                .is_some_and(|a| !a.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let msg = Message::user("mark this please").with_attachment("aGVsbG8=");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["attachmentData"], "aGVsbG8=");
        assert_eq!(json["isProcessing"], false);
        assert!(json["timestamp"].is_i64());
        assert!(json.get("attachmentDataArray").is_none());
    }

    #[test]
    fn minimal_wire_record_parses() {
        let msg: Message =
            serde_json::from_str(r#"{"id": "m-1", "role": "assistant"}"#).unwrap();
        assert_eq!(msg.id.as_str(), "m-1");
        assert_eq!(msg.content, "");
        assert!(!msg.is_processing);
        assert_eq!(msg.timestamp, time::epoch());
    }

    #[test]
    fn placeholder_is_processing_and_empty() {
        let id = MessageId::from("ai-1");
        let msg = Message::assistant_placeholder(id.clone());
        assert_eq!(msg.id, id);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.is_processing);
        assert!(msg.content.is_empty());
    }

    #[test]
    fn has_attachments() {
        assert!(!Message::user("plain").has_attachments());
        assert!(Message::user("one").with_attachment("QQ==").has_attachments());
        assert!(Message::user("many")
            .with_attachments(vec!["QQ==".to_owned()])
            .has_attachments());
        assert!(!Message::user("empty").with_attachments(vec![]).has_attachments());
    }
}
