//! Server-Sent Events (SSE) parser for upstream response bodies.
//!
//! Buffers raw bytes so multi-byte UTF-8 sequences split across network reads
//! are decoded intact.

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (from `event:` line), if present.
    pub event: Option<String>,
    /// Event data (from `data:` lines, joined with newlines).
    pub data: String,
}

impl SseEvent {
    /// True for the OpenAI end-of-stream marker.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Incremental SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return any complete events.
    ///
    /// Events end at a blank line; both `\n\n` and `\r\n\r\n` are accepted.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some((end, delimiter_len)) = find_event_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + delimiter_len).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(event) = Self::parse_event(&text) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let block = std::mem::take(&mut self.buffer);
        Self::parse_event(&String::from_utf8_lossy(&block))
    }

    fn parse_event(text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_parts = Vec::new();

        for line in text.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                event_type = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data_parts.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments (`:`) and unknown fields are ignored
        }

        if data_parts.is_empty() {
            return None;
        }

        Some(SseEvent {
            event: event_type,
            data: data_parts.join("\n"),
        })
    }

    /// Check if there's pending data in the buffer.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Position of the first blank-line delimiter and its length.
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
