//! # In-flight merge leases
//!
//! Job completions and list refreshes can deliver the same session record
//! within moments of each other. Before a server record is merged, a lease
//! keyed on its session id must be acquired; while a lease is live, further
//! deliveries for that id are duplicates and get dropped. Leases expire on
//! their own after a cooldown, measured on the monotonic clock the caller
//! passes in — under `tokio::time::pause` tests drive expiry explicitly.

use examark_core::SessionId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Keyed lease set with a fixed cooldown.
#[derive(Debug)]
pub struct InFlightLeases {
    ttl: Duration,
    leases: HashMap<SessionId, Instant>,
}

impl InFlightLeases {
    /// Lease set whose entries live for `ttl` past acquisition.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            leases: HashMap::new(),
        }
    }

    /// Acquire the lease for `id`, or refuse because one is live.
    ///
    /// Expired leases are pruned first, so a refused acquire always means a
    /// delivery for this session was accepted within the cooldown.
    pub fn try_acquire(&mut self, id: &SessionId, now: Instant) -> bool {
        self.prune(now);
        if self.leases.contains_key(id) {
            return false;
        }
        let _ = self.leases.insert(id.clone(), now + self.ttl);
        true
    }

    /// Whether a live lease exists for `id`.
    #[must_use]
    pub fn is_held(&self, id: &SessionId, now: Instant) -> bool {
        self.leases.get(id).is_some_and(|expiry| *expiry > now)
    }

    /// Drop every expired lease.
    pub fn prune(&mut self, now: Instant) {
        self.leases.retain(|_, expiry| *expiry > now);
    }

    /// The configured cooldown.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of leases, live or awaiting the next prune.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    /// Whether no leases are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
