//! # Synchronizer
//!
//! The shared context holding client-side session state: the current open
//! session, the sidebar summary cache, the in-flight merge leases, and the
//! job-running flag. One instance is constructed at client startup and
//! shared by `Arc`; nothing here is process-global.
//!
//! Mutations follow one discipline: take the write lock, change state, build
//! a snapshot, release the lock, then invoke every listener synchronously
//! with that snapshot before returning to the caller. Listeners run outside
//! the lock, so they may call back into the synchronizer freely.

use crate::cache::{SummaryCache, DEFAULT_SUMMARY_CAPACITY};
use crate::lease::InFlightLeases;
use crate::merge::{is_noop, merge_session};
use examark_core::{
    Message, Session, SessionId, SessionPatch, SessionSummary, SessionUpdate, SummaryPatch,
    DEFAULT_PREVIEW_MAX_CHARS,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default cooldown during which repeat deliveries of a session are dropped.
pub const DEFAULT_MERGE_COOLDOWN: Duration = Duration::from_millis(2_000);

/// Tunables for a [`Synchronizer`].
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Bound on cached sidebar summaries.
    pub summary_capacity: usize,
    /// Character budget for summary previews.
    pub preview_max_chars: usize,
    /// Lease cooldown for duplicate-delivery absorption.
    pub merge_cooldown: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            summary_capacity: DEFAULT_SUMMARY_CAPACITY,
            preview_max_chars: DEFAULT_PREVIEW_MAX_CHARS,
            merge_cooldown: DEFAULT_MERGE_COOLDOWN,
        }
    }
}

/// Snapshot handed to state listeners on every committed change.
#[derive(Clone, Debug)]
pub struct SyncState {
    /// The open session, if any.
    pub current: Option<Session>,
    /// Sidebar summaries in display order.
    pub summaries: Vec<SessionSummary>,
    /// Whether a marking job is streaming right now.
    pub job_running: bool,
}

/// Cross-cutting notifications about individual sessions.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A server record was merged for this session.
    Updated(Session),
    /// The session was removed.
    Deleted(SessionId),
}

/// Handle identifying one subscription; pass back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type StateListener = Arc<dyn Fn(&SyncState) + Send + Sync>;
type EventListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Inner {
    current: Option<Session>,
    cache: SummaryCache,
    leases: InFlightLeases,
    job_running: bool,
}

fn snapshot_of(inner: &Inner) -> SyncState {
    SyncState {
        current: inner.current.clone(),
        summaries: inner.cache.entries().to_vec(),
        job_running: inner.job_running,
    }
}

/// Client-side session state and its observer registries.
pub struct Synchronizer {
    inner: RwLock<Inner>,
    state_listeners: RwLock<Vec<(SubscriberId, StateListener)>>,
    event_listeners: RwLock<Vec<(SubscriberId, EventListener)>>,
    next_subscriber: AtomicU64,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(SyncOptions::default())
    }
}

impl Synchronizer {
    /// Build a synchronizer with the given tunables.
    #[must_use]
    pub fn new(options: SyncOptions) -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: None,
                cache: SummaryCache::with_limits(
                    options.summary_capacity,
                    options.preview_max_chars,
                ),
                leases: InFlightLeases::new(options.merge_cooldown),
                job_running: false,
            }),
            state_listeners: RwLock::new(Vec::new()),
            event_listeners: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    // ── observation ──────────────────────────────────────────────────────

    /// Register a state listener. It fires synchronously on every committed
    /// change, with a snapshot taken under the lock.
    pub fn subscribe(
        &self,
        listener: impl Fn(&SyncState) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        self.state_listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a state listener.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.state_listeners.write().retain(|(sid, _)| *sid != id);
    }

    /// Register a per-session event listener (updates and deletions).
    pub fn subscribe_events(
        &self,
        listener: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        self.event_listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove an event listener.
    pub fn unsubscribe_events(&self, id: SubscriberId) {
        self.event_listeners.write().retain(|(sid, _)| *sid != id);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SyncState {
        snapshot_of(&self.inner.read())
    }

    /// The open session, cloned.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.read().current.clone()
    }

    /// Sidebar summaries in display order, cloned.
    #[must_use]
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.inner.read().cache.entries().to_vec()
    }

    /// Whether a job is streaming right now.
    #[must_use]
    pub fn is_job_running(&self) -> bool {
        self.inner.read().job_running
    }

    // ── local mutations ──────────────────────────────────────────────────

    /// Open a fresh local session under a temporary identity and make it
    /// current. It stays out of the sidebar until the server acknowledges it.
    pub fn open_local_session(&self, message_type: Option<String>) -> Session {
        let session = Session::new_local(message_type);
        let state = {
            let mut inner = self.inner.write();
            inner.current = Some(session.clone());
            snapshot_of(&inner)
        };
        self.notify_state(&state);
        session
    }

    /// Make `session` the current one (at most one session is current).
    pub fn set_current(&self, session: Session) {
        let state = {
            let mut inner = self.inner.write();
            inner.current = Some(session);
            snapshot_of(&inner)
        };
        self.notify_state(&state);
    }

    /// Close the current session, if any.
    pub fn clear_current(&self) {
        let state = {
            let mut inner = self.inner.write();
            if inner.current.is_none() {
                return;
            }
            inner.current = None;
            snapshot_of(&inner)
        };
        self.notify_state(&state);
    }

    /// Append an optimistic message to the current session.
    ///
    /// Returns false when no session is open. Bumps the session's recency to
    /// the message's timestamp.
    pub fn push_local_message(&self, message: Message) -> bool {
        let state = {
            let mut inner = self.inner.write();
            let Some(current) = inner.current.as_mut() else {
                debug!("dropping local message: no current session");
                return false;
            };
            current.updated_at = message.timestamp;
            current.messages.push(message);
            snapshot_of(&inner)
        };
        self.notify_state(&state);
        true
    }

    /// Echo an explicit user edit (rename, favorite, pin, rate) locally.
    ///
    /// Applies to the current session when targeted, and to an existing
    /// cache entry. The server stays authoritative on the next merge.
    pub fn apply_local_update(&self, id: &SessionId, update: &SessionUpdate) -> bool {
        if update.is_empty() {
            return false;
        }
        let state = {
            let mut inner = self.inner.write();
            let mut touched = false;
            if let Some(current) = inner.current.as_mut() {
                if current.id == *id {
                    if let Some(title) = &update.title {
                        current.title.clone_from(title);
                    }
                    if let Some(favorite) = update.favorite {
                        current.favorite = favorite;
                    }
                    if let Some(pinned) = update.pinned {
                        current.pinned = pinned;
                    }
                    if let Some(rating) = update.rating {
                        current.rating = Some(rating);
                    }
                    touched = true;
                }
            }
            if inner.cache.get(id).is_some() {
                let echo = SummaryPatch {
                    title: update.title.clone(),
                    favorite: update.favorite,
                    pinned: update.pinned,
                    rating: update.rating,
                    ..SummaryPatch::new(id.clone())
                };
                touched |= inner.cache.upsert(&echo);
            }
            if !touched {
                return false;
            }
            snapshot_of(&inner)
        };
        self.notify_state(&state);
        true
    }

    /// Drop a session locally: cache entry, and current if it matches.
    pub fn remove_session(&self, id: &SessionId) -> bool {
        let state = {
            let mut inner = self.inner.write();
            let removed = inner.cache.remove(id);
            let was_current = inner.current.as_ref().is_some_and(|c| c.id == *id);
            if was_current {
                inner.current = None;
            }
            if !removed && !was_current {
                return false;
            }
            snapshot_of(&inner)
        };
        self.notify_state(&state);
        self.notify_event(&SessionEvent::Deleted(id.clone()));
        true
    }

    // ── server deliveries ────────────────────────────────────────────────

    /// Merge a server record delivered outside a job (list refresh, edit
    /// echo). Returns the merged session, or `None` when the delivery was
    /// dropped as an in-flight duplicate.
    pub fn apply_patch(&self, patch: &SessionPatch) -> Option<Session> {
        let (merged, state) = {
            let mut inner = self.inner.write();
            if !inner.leases.try_acquire(&patch.id, Instant::now()) {
                debug!(session_id = %patch.id, "dropping duplicate in-flight delivery");
                return None;
            }
            let is_current = inner.current.as_ref().is_some_and(|c| c.id == patch.id);
            if is_current {
                if let Some(local) = inner.current.as_ref() {
                    if is_noop(local, patch) {
                        debug!(session_id = %patch.id, "no-op delivery");
                        return Some(local.clone());
                    }
                }
                let merged = merge_session(inner.current.as_ref(), patch);
                inner.current = Some(merged.clone());
                let _ = inner.cache.upsert_session(&merged);
                (merged, snapshot_of(&inner))
            } else {
                let merged = merge_session(None, patch);
                let _ = inner.cache.upsert_record(patch);
                (merged, snapshot_of(&inner))
            }
        };
        self.notify_state(&state);
        self.notify_event(&SessionEvent::Updated(merged.clone()));
        Some(merged)
    }

    /// Merge a page of server records, one delivery at a time.
    pub fn apply_patches(&self, patches: &[SessionPatch]) -> Vec<Session> {
        patches.iter().filter_map(|p| self.apply_patch(p)).collect()
    }

    /// Seed or refresh sidebar summaries in one batch (single re-sort, one
    /// notification). Returns how many were accepted.
    pub fn apply_summaries(&self, patches: &[SummaryPatch]) -> usize {
        let (accepted, state) = {
            let mut inner = self.inner.write();
            let accepted = inner.cache.upsert_batch(patches);
            if accepted == 0 {
                return 0;
            }
            (accepted, snapshot_of(&inner))
        };
        self.notify_state(&state);
        accepted
    }

    /// Merge the terminal result of a marking job.
    ///
    /// `origin` is the session id the job was submitted under. When the
    /// current session still carries that temporary identity, it adopts the
    /// incoming permanent id first, so the merge sees a same-session update
    /// and locally-held attachments survive. A result for a session that is
    /// no longer current still lands in the cache. Returns `None` when the
    /// delivery was dropped as an in-flight duplicate.
    pub fn apply_job_result(
        &self,
        origin: Option<&SessionId>,
        patch: &SessionPatch,
    ) -> Option<Session> {
        let (merged, state) = {
            let mut inner = self.inner.write();
            if !inner.leases.try_acquire(&patch.id, Instant::now()) {
                debug!(session_id = %patch.id, "dropping duplicate in-flight delivery");
                return None;
            }
            if let Some(current) = inner.current.as_mut() {
                if current.id.is_temporary() && origin.is_some_and(|o| *o == current.id) {
                    debug!(
                        from = %current.id,
                        to = %patch.id,
                        "promoting temporary session identity"
                    );
                    current.id = patch.id.clone();
                }
            }
            let merged = if inner.current.as_ref().is_some_and(|c| c.id == patch.id) {
                let merged = merge_session(inner.current.as_ref(), patch);
                inner.current = Some(merged.clone());
                merged
            } else {
                merge_session(None, patch)
            };
            let _ = inner.cache.upsert_session(&merged);
            (merged, snapshot_of(&inner))
        };
        self.notify_state(&state);
        self.notify_event(&SessionEvent::Updated(merged.clone()));
        Some(merged)
    }

    // ── job lifecycle flag ───────────────────────────────────────────────

    /// Raise the job-running flag (no-op when already raised).
    pub fn begin_job(&self) {
        let state = {
            let mut inner = self.inner.write();
            if inner.job_running {
                return;
            }
            inner.job_running = true;
            snapshot_of(&inner)
        };
        self.notify_state(&state);
    }

    /// Lower the job-running flag (no-op when already lowered).
    pub fn end_job(&self) {
        let state = {
            let mut inner = self.inner.write();
            if !inner.job_running {
                return;
            }
            inner.job_running = false;
            snapshot_of(&inner)
        };
        self.notify_state(&state);
    }

    // ── internals ────────────────────────────────────────────────────────

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed))
    }

    fn notify_state(&self, state: &SyncState) {
        let listeners: Vec<StateListener> = self
            .state_listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    fn notify_event(&self, event: &SessionEvent) {
        let listeners: Vec<EventListener> = self
            .event_listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
