//! Client error types and API error response parsing.

use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the marking-service client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON where a structured body was required.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the marking service.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Human-readable error message.
        message: String,
        /// Service-specific error code, when the body carried one.
        code: Option<String>,
        /// Whether this request can be retried (429 or 5xx).
        retryable: bool,
    },

    /// Terminal error frame delivered on a job stream.
    #[error("Job failed: {message}")]
    Stream {
        /// Error description from the service.
        message: String,
        /// The account ran out of marking credits.
        credits_exhausted: bool,
    },

    /// Client configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_) | Self::Stream { .. } | Self::Config(_) => false,
        }
    }

    /// Whether this is the credits-exhausted job failure.
    #[must_use]
    pub fn is_credits_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Stream {
                credits_exhausted: true,
                ..
            }
        )
    }
}

/// Parsed API error information.
pub struct ApiErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Service-specific error code.
    pub code: Option<String>,
    /// Whether the request can be retried (429 or 5xx).
    pub retryable: bool,
}

/// Parse a non-2xx response body into structured error info.
///
/// The marking service usually sends `{"error": "..."}`; older endpoints use
/// `{"error": {"message": "..."}}` or a flat `{"message": "..."}`. Anything
/// else falls back to the raw body text.
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let retryable = status == 429 || status >= 500;

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        // Flat string envelope: {"error": "..."}
        if let Some(msg) = json["error"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: json["code"].as_str().map(String::from),
                retryable,
            };
        }

        // Nested envelope: {"error": {"message": "...", "type": "..."}}
        if let Some(msg) = json["error"]["message"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: json["error"]["type"].as_str().map(String::from),
                retryable,
            };
        }

        // Flat message: {"message": "...", "code": "..."}
        if let Some(msg) = json["message"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: json["code"].as_str().map(String::from),
                retryable,
            };
        }

        // Valid JSON but unrecognized structure, include raw body
        return ApiErrorInfo {
            message: format!("HTTP {status}: {body}"),
            code: None,
            retryable,
        };
    }

    // Not JSON
    ApiErrorInfo {
        message: format!("HTTP {status}: {body}"),
        code: None,
        retryable,
    }
}

impl ApiErrorInfo {
    /// Lift into the client error type for a given status.
    #[must_use]
    pub fn into_error(self, status: u16) -> ClientError {
        ClientError::Api {
            status,
            message: self.message,
            code: self.code,
            retryable: self.retryable,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
