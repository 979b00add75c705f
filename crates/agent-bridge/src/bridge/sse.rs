//! Incremental Server-Sent-Events decoder
//!
//! Accumulates raw response-body bytes, splits on the blank-line frame
//! delimiter, and decodes each complete `data:` record into an
//! [`AgentEvent`]. Only whole frames are ever converted to text, so frames
//! (and multibyte characters) split across network reads decode the same as
//! whole ones.

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::event::AgentEvent;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns every event completed by it, in frame
    /// order. Frames that are not `data:` records or fail to decode are
    /// skipped with a warning.
    pub fn push(&mut self, chunk: &Bytes) -> Vec<AgentEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((idx, delim_len)) = frame_boundary(&self.buffer) {
            let frame = self.buffer.split_to(idx + delim_len);
            let text = String::from_utf8_lossy(&frame);
            if let Some(event) = decode_frame(text.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Whether undelivered partial bytes remain after the stream ended.
    pub fn has_partial(&self) -> bool {
        !String::from_utf8_lossy(&self.buffer).trim().is_empty()
    }
}

/// Position and length of the earliest frame delimiter: a blank line in
/// either LF (`\n\n`) or CRLF (`\r\n\r\n`) framing.
fn frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find_bytes(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find_bytes(buffer, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_frame(frame: &str) -> Option<AgentEvent> {
    if frame.is_empty() {
        return None;
    }

    // Multi-line data fields concatenate per the SSE spec; comment lines
    // (":" prefix) and other fields are ignored.
    let mut data = String::new();
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<AgentEvent>(&data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, frame = %data, "undecodable event frame skipped");
            None
        }
    }
}
