//! # examark-client
//!
//! Client for the Examark marking service. One [`ExamarkClient`] owns the
//! HTTP connection pool and a shared [`Synchronizer`]; callers submit papers
//! for marking, pull typed events off the returned stream, and observe
//! session state through the synchronizer.
//!
//! ```ignore
//! let client = ExamarkClient::from_env()?;
//! let mut stream = client
//!     .submit_job(JobRequest::Text { paper: essay })
//!     .await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         JobEvent::Progress(p) => render_checklist(&p),
//!         JobEvent::Unknown(_) => {}
//!         JobEvent::Completed(session) => show(&session),
//!     }
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod job;
pub mod sessions;

use std::sync::Arc;

pub use config::{load_config, load_config_from_path, ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use job::{JobEvent, JobFile, JobRequest, JobStream};
pub use sessions::{ListSessionsQuery, SessionsApi};

// Re-exported so callers can drive the client without naming the inner crates.
pub use examark_core::{
    Message, MessageId, Role, Session, SessionId, SessionPatch, SessionSummary, SessionUpdate,
    UserId,
};
pub use examark_protocol::{Frame, ProgressFrame};
pub use examark_sync::{SessionEvent, SubscriberId, SyncOptions, SyncState, Synchronizer};

/// Facade over job submission, the session REST endpoints, and local state.
///
/// Cheap to share: clone the inner [`Synchronizer`] handle via
/// [`ExamarkClient::synchronizer`] for observers, and keep one client per
/// process for connection reuse.
pub struct ExamarkClient {
    http: reqwest::Client,
    config: ClientConfig,
    sync: Arc<Synchronizer>,
    sessions: SessionsApi,
}

impl ExamarkClient {
    /// Build a client from explicit configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let http = reqwest::Client::new();
        let sync = Arc::new(Synchronizer::new(config.sync_options()));
        let sessions = SessionsApi::new(http.clone(), &config);
        Self {
            http,
            config,
            sync,
            sessions,
        }
    }

    /// Build a client from `~/.examark/config.json` and `EXAMARK_*` env vars.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(config::load_config()?))
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared session state; subscribe here for UI updates.
    #[must_use]
    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    /// Direct access to the session REST endpoints.
    #[must_use]
    pub fn sessions(&self) -> &SessionsApi {
        &self.sessions
    }

    // ── session lifecycle ────────────────────────────────────────────────

    /// Open a fresh local session and make it current.
    pub fn open_session(&self, message_type: Option<String>) -> Session {
        self.sync.open_local_session(message_type)
    }

    /// Make a previously fetched session the current one.
    pub fn select_session(&self, session: Session) {
        self.sync.set_current(session);
    }

    /// Close the current session, if any.
    pub fn close_session(&self) {
        self.sync.clear_current();
    }

    // ── jobs ─────────────────────────────────────────────────────────────

    /// Submit work for marking under the configured default model.
    pub async fn submit_job(&self, request: JobRequest) -> Result<JobStream> {
        self.submit_job_with_model(request, None).await
    }

    /// Submit work for marking, optionally overriding the model.
    ///
    /// Stages the user's submission and an assistant placeholder into the
    /// current session (opening one if none is open), then POSTs the job.
    /// The returned stream is pull-based; dropping it abandons the job.
    pub async fn submit_job_with_model(
        &self,
        request: JobRequest,
        model: Option<&str>,
    ) -> Result<JobStream> {
        let current = match self.sync.current_session() {
            Some(session) => session,
            None => self.sync.open_local_session(None),
        };
        let origin = current.id.clone();
        let session_id = (!origin.is_temporary()).then(|| origin.clone());

        let mut user_message = Message::user(request.display_text());
        let attachments = request.attachment_payloads();
        if !attachments.is_empty() {
            user_message = user_message.with_attachments(attachments);
        }
        let _ = self.sync.push_local_message(user_message);

        let ai_message_id = MessageId::new();
        let _ = self
            .sync
            .push_local_message(Message::assistant_placeholder(ai_message_id.clone()));

        let context = job::JobContext {
            origin,
            session_id,
            ai_message_id,
            model: model.unwrap_or(&self.config.default_model).to_string(),
        };
        job::submit(&self.http, &self.config, Arc::clone(&self.sync), context, &request).await
    }

    // ── session list and edits ───────────────────────────────────────────

    /// Fetch the newest page of sessions and merge it into local state.
    /// Returns how many records were merged (duplicates inside the merge
    /// cooldown are absorbed).
    pub async fn refresh_sessions(&self) -> Result<usize> {
        let user = self.require_user()?;
        let query = ListSessionsQuery {
            limit: Some(self.config.page_size),
            ..ListSessionsQuery::default()
        };
        let records = self.sessions.list(&user, &query).await?;
        Ok(self.sync.apply_patches(&records).len())
    }

    /// Fetch the page older than everything cached and merge it in.
    pub async fn load_more_sessions(&self) -> Result<usize> {
        let user = self.require_user()?;
        let cursor = self.sync.summaries().last().map(|s| s.updated_at);
        let query = ListSessionsQuery {
            limit: Some(self.config.page_size),
            last_updated_at: cursor,
            ..ListSessionsQuery::default()
        };
        let records = self.sessions.list(&user, &query).await?;
        Ok(self.sync.apply_patches(&records).len())
    }

    /// Rename a session.
    pub async fn rename_session(&self, id: &SessionId, title: impl Into<String>) -> Result<()> {
        let update = SessionUpdate {
            title: Some(title.into()),
            ..SessionUpdate::default()
        };
        self.push_update(id, update).await
    }

    /// Set or clear the favorite flag.
    pub async fn set_favorite(&self, id: &SessionId, favorite: bool) -> Result<()> {
        let update = SessionUpdate {
            favorite: Some(favorite),
            ..SessionUpdate::default()
        };
        self.push_update(id, update).await
    }

    /// Pin or unpin a session in the sidebar.
    pub async fn set_pinned(&self, id: &SessionId, pinned: bool) -> Result<()> {
        let update = SessionUpdate {
            pinned: Some(pinned),
            ..SessionUpdate::default()
        };
        self.push_update(id, update).await
    }

    /// Rate the marking result for a session.
    pub async fn set_rating(&self, id: &SessionId, rating: u8) -> Result<()> {
        let update = SessionUpdate {
            rating: Some(rating),
            ..SessionUpdate::default()
        };
        self.push_update(id, update).await
    }

    /// Delete a session, server-side and locally.
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        // Temporary sessions were never acknowledged; nothing to delete remotely.
        if !id.is_temporary() {
            self.sessions.delete(id).await?;
        }
        let _ = self.sync.remove_session(id);
        Ok(())
    }

    async fn push_update(&self, id: &SessionId, update: SessionUpdate) -> Result<()> {
        if !id.is_temporary() {
            self.sessions.update(id, &update).await?;
        }
        let _ = self.sync.apply_local_update(id, &update);
        Ok(())
    }

    fn require_user(&self) -> Result<UserId> {
        self.config
            .user_id
            .as_deref()
            .map(UserId::from)
            .ok_or_else(|| ClientError::Config(ConfigError::Missing("userId".to_string())))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
