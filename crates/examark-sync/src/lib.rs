//! # examark-sync
//!
//! Local session state and its reconciliation with server deliveries.
//!
//! - [`merge::merge_session`] — folds a partial server record into the local
//!   session: shallow field overlay, stats overlay with cost re-assertion,
//!   message union with placeholder replacement, attachment carry-forward
//! - [`cache::SummaryCache`] — the bounded sidebar cache, pinned-first then
//!   most-recent, merge-upsert semantics
//! - [`lease::InFlightLeases`] — keyed duplicate-delivery absorption with a
//!   monotonic-clock cooldown
//! - [`store::Synchronizer`] — the shared context tying those together:
//!   current session, cache, job flag, and synchronous observer registries

#![deny(unsafe_code)]

pub mod cache;
pub mod lease;
pub mod merge;
pub mod store;

pub use cache::{SummaryCache, DEFAULT_SUMMARY_CAPACITY};
pub use lease::InFlightLeases;
pub use merge::{is_noop, merge_session};
pub use store::{SessionEvent, SubscriberId, SyncOptions, SyncState, Synchronizer};
