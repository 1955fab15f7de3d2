//! # Frame Decoder
//!
//! Line-oriented state machine over raw response bytes.
//!
//! Bytes are buffered until a `\n` shows up; each complete line (minus a
//! trailing `\r`) is classified with [`decode_line`] and the resulting
//! [`StreamEvent`] is applied. Buffering raw bytes rather than text means a
//! multi-byte character split across two chunks decodes correctly.
//!
//! ```text
//!            feed(chunk)                     finish()
//! Accumulating ───────────► Accumulating ───────────► Exhausted
//!      │ {"completed":true}
//!      ▼
//!  Completed   (later chunks and buffered bytes are ignored)
//! ```

use crate::schemas::{frame_content, is_completion_frame};
use serde_json::Value;
use tracing::trace;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Meaning of one decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ContentDelta(String),
    Completed,
    /// Not valid JSON; dropped.
    Unparsable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Accumulating,
    Completed,
    Exhausted,
}

/// Receives content deltas, in whole-result or streaming mode.
pub trait DeltaSink {
    fn on_delta(&mut self, text: &str);
}

/// Whole-result mode: concatenates every delta.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    text: String,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl DeltaSink for Accumulator {
    fn on_delta(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

/// Streaming mode: hands each delta to a caller closure.
pub struct ForwardDeltas<F>(pub F);

impl<F: FnMut(&str)> DeltaSink for ForwardDeltas<F> {
    fn on_delta(&mut self, text: &str) {
        (self.0)(text)
    }
}

/// Classify a single line, already stripped of its terminator.
///
/// Returns `None` for lines that carry nothing: blank lines, empty `data:`
/// payloads, the `[DONE]` sentinel, and JSON frames without content.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    if line.trim().is_empty() {
        return None;
    }

    let payload = match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => {
            let rest = rest.trim();
            if rest.is_empty() || rest == DONE_SENTINEL {
                return None;
            }
            rest
        }
        // Some providers emit bare JSON lines.
        None => line,
    };

    let frame: Value = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(err) => {
            trace!(error = %err, "Dropping unparsable stream line");
            return Some(StreamEvent::Unparsable);
        }
    };

    if is_completion_frame(&frame) {
        return Some(StreamEvent::Completed);
    }

    frame_content(&frame).map(StreamEvent::ContentDelta)
}

/// Counters kept for the end-of-stream debug log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub lines: usize,
    pub deltas: usize,
    pub unparsable: usize,
}

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no `\n`.
    scanned: usize,
    state: DecoderState,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            scanned: 0,
            state: DecoderState::Accumulating,
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Consume one chunk, dispatching every line it completes.
    pub fn feed<S: DeltaSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> DecoderState {
        if self.state != DecoderState::Accumulating {
            return self.state;
        }

        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            let event = {
                let raw = &self.buffer[consumed..end];
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                decode_line(&String::from_utf8_lossy(raw))
            };
            consumed = end + 1;
            search_from = consumed;

            if self.apply(event, sink) == DecoderState::Completed {
                self.buffer.clear();
                self.scanned = 0;
                return self.state;
            }
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        self.state
    }

    /// End of stream: the unterminated remainder is treated as a final line.
    pub fn finish<S: DeltaSink + ?Sized>(&mut self, sink: &mut S) -> DecoderState {
        if self.state != DecoderState::Accumulating {
            return self.state;
        }

        let residual = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if !residual.is_empty() {
            let raw = residual.strip_suffix(b"\r").unwrap_or(&residual);
            let event = decode_line(&String::from_utf8_lossy(raw));
            if self.apply(event, sink) == DecoderState::Completed {
                return self.state;
            }
        }

        self.state = DecoderState::Exhausted;
        self.state
    }

    fn apply<S: DeltaSink + ?Sized>(&mut self, event: Option<StreamEvent>, sink: &mut S) -> DecoderState {
        self.stats.lines += 1;
        match event {
            Some(StreamEvent::ContentDelta(text)) => {
                self.stats.deltas += 1;
                sink.on_delta(&text);
            }
            Some(StreamEvent::Completed) => {
                self.state = DecoderState::Completed;
            }
            Some(StreamEvent::Unparsable) => {
                self.stats.unparsable += 1;
            }
            None => {}
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_STREAM: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n",
        "data: {\"completed\":true}\n",
    );

    fn decode_chunks(chunks: &[&[u8]]) -> (String, DecoderState) {
        let mut decoder = FrameDecoder::new();
        let mut acc = Accumulator::new();
        for chunk in chunks {
            decoder.feed(chunk, &mut acc);
        }
        let state = decoder.finish(&mut acc);
        (acc.into_string(), state)
    }

    #[test]
    fn test_decode_line_classification() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   "), None);
        assert_eq!(decode_line("data: "), None);
        assert_eq!(decode_line("data: [DONE]"), None);
        assert_eq!(decode_line("data: {not json"), Some(StreamEvent::Unparsable));
        assert_eq!(decode_line("event: message"), Some(StreamEvent::Unparsable));
        assert_eq!(decode_line("data: {\"completed\":true}"), Some(StreamEvent::Completed));
        assert_eq!(
            decode_line("{\"choices\":[{\"message\":{\"content\":\"raw\"}}]}"),
            Some(StreamEvent::ContentDelta("raw".to_string()))
        );
        assert_eq!(decode_line("data: {\"choices\":[{\"delta\":{}}]}"), None);
    }

    #[test]
    fn test_hello_stream() {
        let (text, state) = decode_chunks(&[HELLO_STREAM.as_bytes()]);
        assert_eq!(text, "Hello");
        assert_eq!(state, DecoderState::Completed);
    }

    #[test]
    fn test_every_two_way_split_gives_same_result() {
        let bytes = HELLO_STREAM.as_bytes();
        for split in 0..=bytes.len() {
            let (text, state) = decode_chunks(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(text, "Hello", "split at {}", split);
            assert_eq!(state, DecoderState::Completed, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_with_multibyte_content() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo 世界\"}}]}\r\n\r\ndata: [DONE]\r\n";
        let chunks: Vec<&[u8]> = stream.as_bytes().chunks(1).collect();
        let (text, state) = decode_chunks(&chunks);
        assert_eq!(text, "héllo 世界");
        assert_eq!(state, DecoderState::Exhausted);
    }

    #[test]
    fn test_completion_truncates_later_content() {
        let mut decoder = FrameDecoder::new();
        let mut acc = Accumulator::new();

        let first = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: {\"completed\":true}\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n";
        assert_eq!(decoder.feed(first.as_bytes(), &mut acc), DecoderState::Completed);
        assert_eq!(decoder.pending(), 0);

        let later = "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n";
        assert_eq!(decoder.feed(later.as_bytes(), &mut acc), DecoderState::Completed);
        assert_eq!(decoder.finish(&mut acc), DecoderState::Completed);
        assert_eq!(acc.as_str(), "a");
    }

    #[test]
    fn test_done_sentinel_does_not_stop_accumulation() {
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"two\"}}]}\n",
        );
        let (text, state) = decode_chunks(&[stream.as_bytes()]);
        assert_eq!(text, "onetwo");
        assert_eq!(state, DecoderState::Exhausted);
    }

    #[test]
    fn test_malformed_line_is_isolated() {
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"\n",
            "garbage\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        );
        let mut decoder = FrameDecoder::new();
        let mut acc = Accumulator::new();
        decoder.feed(stream.as_bytes(), &mut acc);
        decoder.finish(&mut acc);

        assert_eq!(acc.as_str(), "ok");
        assert_eq!(decoder.stats().unparsable, 2);
        assert_eq!(decoder.stats().deltas, 1);
    }

    #[test]
    fn test_trailing_partial_line_is_flushed() {
        let stream = "{\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n{\"choices\":[{\"message\":{\"content\":\"b\"}}]}";
        let (text, state) = decode_chunks(&[stream.as_bytes()]);
        assert_eq!(text, "ab");
        assert_eq!(state, DecoderState::Exhausted);
    }

    #[test]
    fn test_long_line_in_small_chunks_is_scanned_once() {
        let content = "x".repeat(64 * 1024);
        let stream = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\ndata: {{\"choices\":[{{\"delta\":{{\"content\":\"!\"}}}}]}}\n",
            content
        );
        let mut decoder = FrameDecoder::new();
        let mut acc = Accumulator::new();

        for chunk in stream.as_bytes().chunks(7) {
            decoder.feed(chunk, &mut acc);
            // Everything still buffered has been searched for a terminator.
            assert_eq!(decoder.scanned, decoder.pending());
        }

        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.finish(&mut acc), DecoderState::Exhausted);
        assert_eq!(acc.as_str().len(), content.len() + 1);
        assert!(acc.as_str().ends_with("x!"));
    }

    #[test]
    fn test_forward_deltas_sees_each_fragment() {
        let mut seen = Vec::new();
        {
            let mut sink = ForwardDeltas(|text: &str| seen.push(text.to_string()));
            let mut decoder = FrameDecoder::new();
            decoder.feed(HELLO_STREAM.as_bytes(), &mut sink);
        }
        assert_eq!(seen, vec!["He".to_string(), "llo".to_string()]);
    }
}
