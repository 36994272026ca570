//! # examark-protocol
//!
//! The streaming-job wire protocol.
//!
//! Marking jobs stream their lifecycle as newline-delimited JSON events over
//! a chunked HTTP response. This crate owns the two stages between raw bytes
//! and typed events:
//! - Line decoding: chunk boundaries never align with event boundaries, so
//!   [`LineDecoder`] buffers partial lines and [`decode_lines`] adapts a
//!   fallible byte stream into a line stream (flushing the tail at EOS)
//! - Frame interpretation: [`interpret_line`] extracts the event payload and
//!   classifies it once into the closed [`Frame`] union; downstream code
//!   matches on the variant and never re-inspects JSON

#![deny(unsafe_code)]

pub mod frame;
pub mod line;

pub use frame::{interpret_line, CompletionFrame, ErrorFrame, Frame, ProgressFrame};
pub use line::{decode_lines, LineDecoder};
