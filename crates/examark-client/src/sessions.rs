//! Session REST endpoints: list, edit, delete.
//!
//! List responses are arrays of partial session records. A malformed element
//! is logged and skipped rather than failing the whole page; the rest of the
//! list still loads.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::{error, warn};

use examark_core::{SessionId, SessionPatch, SessionUpdate, UserId};

use crate::config::ClientConfig;
use crate::error::{parse_api_error, Result};

/// Filters for a session list request.
#[derive(Clone, Debug, Default)]
pub struct ListSessionsQuery {
    /// Maximum records to return.
    pub limit: Option<usize>,
    /// Only sessions modified strictly before this time. The list is newest
    /// first, so this is the cursor for fetching the next, older page.
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Only sessions of this classification.
    pub message_type: Option<String>,
}

impl ListSessionsQuery {
    /// Query-string pairs, omitting unset filters. Timestamps go over the
    /// wire as epoch milliseconds.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = self.last_updated_at {
            pairs.push(("lastUpdatedAt", cursor.timestamp_millis().to_string()));
        }
        if let Some(message_type) = &self.message_type {
            pairs.push(("messageType", message_type.clone()));
        }
        pairs
    }
}

/// Thin wrapper over the session REST endpoints.
pub struct SessionsApi {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl SessionsApi {
    /// Bind the API to a connection pool and configuration.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.http.request(method, url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Fetch a page of session records for `user`.
    pub async fn list(
        &self,
        user: &UserId,
        query: &ListSessionsQuery,
    ) -> Result<Vec<SessionPatch>> {
        let response = self
            .request(Method::GET, &format!("/sessions/{user}"))
            .query(&query.query_pairs())
            .send()
            .await?;
        let response = expect_success(response).await?;

        let items: Vec<Value> = response.json().await?;
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<SessionPatch>(item) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping malformed session record"),
            }
        }
        Ok(records)
    }

    /// Apply an explicit edit (rename, favorite, pin, rate) to a session.
    pub async fn update(&self, id: &SessionId, update: &SessionUpdate) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("/session/{id}"))
            .json(update)
            .send()
            .await?;
        let _ = expect_success(response).await?;
        Ok(())
    }

    /// Delete a session server-side.
    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/session/{id}"))
            .send()
            .await?;
        let _ = expect_success(response).await?;
        Ok(())
    }
}

/// Pass through a 2xx response, or read the body and lift it into a typed
/// API error.
pub(crate) async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let info = parse_api_error(&body, status.as_u16());
    error!(
        status = status.as_u16(),
        code = info.code.as_deref().unwrap_or("unknown"),
        "marking service error"
    );
    Err(info.into_error(status.as_u16()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
