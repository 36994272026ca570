//! # examark-core
//!
//! Foundation types for the Examark marking client.
//!
//! Everything the other crates share lives here:
//! - Branded ID newtypes (`SessionId`, `MessageId`, `UserId`)
//! - The session data model (`Session`, `Message`, `SessionStats`) and its
//!   partial wire forms (`SessionPatch`, `StatsPatch`, `SessionUpdate`)
//! - Sidebar projections (`SessionSummary`, `SummaryPatch`)
//! - Lenient epoch-milliseconds timestamp (de)serialization
//! - Small text utilities (preview truncation)

#![deny(unsafe_code)]

pub mod ids;
pub mod message;
pub mod session;
pub mod summary;
pub mod text;
pub mod time;

pub use ids::{MessageId, SessionId, UserId};
pub use message::{Message, Role};
pub use session::{
    CostBreakdown, Session, SessionPatch, SessionStats, SessionUpdate, StatsPatch, DEFAULT_TITLE,
};
pub use summary::{
    last_message_preview, project_summary, SessionSummary, SummaryPatch,
    DEFAULT_PREVIEW_MAX_CHARS,
};
