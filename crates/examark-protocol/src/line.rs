//! # Line decoder
//!
//! Job streams arrive as chunked bytes with no alignment between chunk and
//! event boundaries: one chunk may carry several events, one event may span
//! several chunks. [`LineDecoder`] buffers raw bytes and yields complete
//! lines; [`decode_lines`] wraps it around a fallible byte stream.
//!
//! Rules:
//! - Split on `\n`, strip one trailing `\r` per line
//! - Lines that are not valid UTF-8 are skipped (multi-byte characters split
//!   across chunks are fine — decoding happens per complete line)
//! - At end of stream a non-empty trailing fragment is flushed as a final
//!   line, so a terminal event without a newline is not lost

use bytes::BytesMut;
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::debug;

/// Incremental splitter from byte chunks to complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Append a chunk and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            // Split the line bytes out of the buffer (zero-copy split)
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            // Remove trailing \n
            line_bytes.truncate(line_bytes.len() - 1);
            // Remove trailing \r if present
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }

            match std::str::from_utf8(&line_bytes) {
                Ok(line) => lines.push(line.to_owned()),
                Err(_) => debug!(len = line_bytes.len(), "skipping non-UTF-8 line"),
            }
        }
        lines
    }

    /// Flush the trailing fragment as a final line, if any.
    ///
    /// Call once when the byte stream ends. Leaves the decoder empty.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line_bytes = self.buffer.split();
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.truncate(line_bytes.len() - 1);
        }
        match std::str::from_utf8(&line_bytes) {
            Ok(line) if !line.is_empty() => Some(line.to_owned()),
            Ok(_) => None,
            Err(_) => {
                debug!(len = line_bytes.len(), "skipping non-UTF-8 trailing fragment");
                None
            }
        }
    }
}

/// Adapt a fallible byte-chunk stream into a line stream.
///
/// Transport errors pass through once and terminate the stream; the caller
/// decides how to surface them. The trailing fragment is flushed at EOS.
pub fn decode_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let mut byte_stream = byte_stream;
        let mut decoder = LineDecoder::new();
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in decoder.push(&bytes) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(line) = decoder.finish() {
            yield Ok(line);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;
    use std::convert::Infallible;

    fn collect_all(decoder: &mut LineDecoder, chunks: &[&[u8]]) -> Vec<String> {
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push(chunk));
        }
        lines.extend(decoder.finish());
        lines
    }

    // ── LineDecoder ──────────────────────────────────────────────────────

    #[test]
    fn one_chunk_many_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"alpha\nbeta\ngamma\n");
        assert_eq!(lines, vec!["alpha", "beta", "gamma"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn line_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"hel").is_empty());
        assert!(decoder.push(b"lo wor").is_empty());
        assert_eq!(decoder.push(b"ld\n"), vec!["hello world"]);
    }

    #[test]
    fn crlf_is_stripped() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"first\r\nsecond\r\n"), vec!["first", "second"]);
    }

    #[test]
    fn empty_lines_are_yielded() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn finish_flushes_trailing_fragment() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"no newline at end").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("no newline at end"));
        // Decoder is reusable and empty afterwards.
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn finish_strips_trailing_cr() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"tail\r").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let bytes = "data: {\"step\":\"採点中\"}\n".as_bytes();
        // Cut inside the multi-byte sequence.
        let cut = bytes.iter().position(|&b| b > 0x7f).unwrap() + 1;
        let mut decoder = LineDecoder::new();
        let lines = collect_all(&mut decoder, &[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(lines, vec!["data: {\"step\":\"採点中\"}"]);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"good\n\xff\xfe\xfd\nalso good\n");
        assert_eq!(lines, vec!["good", "also good"]);
    }

    #[test]
    fn invalid_utf8_trailing_fragment_is_dropped() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"\xff\xfe").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    // ── decode_lines (stream adapter) ────────────────────────────────────

    #[tokio::test]
    async fn stream_yields_lines_across_chunk_boundaries() {
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from("data: {\"a\"")),
            Ok(Bytes::from(":1}\ndata: ")),
            Ok(Bytes::from("{\"b\":2}\n")),
        ];
        let lines: Vec<_> = decode_lines(futures::stream::iter(chunks)).collect().await;
        let lines: Vec<String> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines, vec!["data: {\"a\":1}", "data: {\"b\":2}"]);
    }

    #[tokio::test]
    async fn stream_flushes_tail_at_eos() {
        let chunks: Vec<Result<Bytes, Infallible>> =
            vec![Ok(Bytes::from("data: {\"done\":true}"))];
        let lines: Vec<_> = decode_lines(futures::stream::iter(chunks)).collect().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_deref().unwrap(), "data: {\"done\":true}");
    }

    #[tokio::test]
    async fn stream_surfaces_transport_error_and_stops() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("one\n")),
            Err(std::io::Error::other("connection reset")),
            Ok(Bytes::from("never seen\n")),
        ];
        let items: Vec<_> = decode_lines(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "one");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let chunks: Vec<Result<Bytes, Infallible>> = vec![];
        let lines: Vec<_> = decode_lines(futures::stream::iter(chunks)).collect().await;
        assert!(lines.is_empty());
    }

    // ── chunking is invisible ────────────────────────────────────────────

    fn decode_whole(data: &[u8]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        collect_all(&mut decoder, &[data])
    }

    proptest! {
        #[test]
        fn single_cut_never_changes_output(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            cut in 0usize..512,
        ) {
            let cut = cut.min(data.len());
            let mut decoder = LineDecoder::new();
            let split = collect_all(&mut decoder, &[&data[..cut], &data[cut..]]);
            prop_assert_eq!(split, decode_whole(&data));
        }

        #[test]
        fn arbitrary_chunking_never_changes_output(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            sizes in proptest::collection::vec(1usize..32, 0..64),
        ) {
            let mut decoder = LineDecoder::new();
            let mut lines = Vec::new();
            let mut rest: &[u8] = &data;
            for size in sizes {
                if rest.is_empty() {
                    break;
                }
                let take = size.min(rest.len());
                lines.extend(decoder.push(&rest[..take]));
                rest = &rest[take..];
            }
            lines.extend(decoder.push(rest));
            lines.extend(decoder.finish());
            prop_assert_eq!(lines, decode_whole(&data));
        }
    }
}
