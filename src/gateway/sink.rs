//! Writable response sink handed to the gateway by a transport.

use async_trait::async_trait;
use bytes::Bytes;

pub const EVENT_STREAM: &str = "text/event-stream";
pub const APPLICATION_JSON: &str = "application/json";

/// Status and content type, fixed before the first body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: &'static str,
}

impl ResponseHead {
    #[must_use]
    pub fn event_stream() -> Self {
        Self {
            status: 200,
            content_type: EVENT_STREAM,
        }
    }

    #[must_use]
    pub fn json(status: u16) -> Self {
        Self {
            status,
            content_type: APPLICATION_JSON,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The reader went away.
    #[error("Response sink closed")]
    Closed,
    #[error("Response already started")]
    AlreadyStarted,
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Byte sink with a start/write/end contract.
///
/// `start` is called exactly once, before any `write`. `end` closes the sink;
/// nothing may be written after it.
#[async_trait]
pub trait ResponseSink: Send {
    async fn start(&mut self, head: ResponseHead) -> Result<(), SinkError>;
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError>;
    async fn end(&mut self) -> Result<(), SinkError>;
}

/// Sink that records everything written to it.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub head: Option<ResponseHead>,
    pub writes: Vec<Bytes>,
    pub ended: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes concatenated as text.
    #[must_use]
    pub fn body(&self) -> String {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w))
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|h| h.status)
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn start(&mut self, head: ResponseHead) -> Result<(), SinkError> {
        if self.head.is_some() {
            return Err(SinkError::AlreadyStarted);
        }
        self.head = Some(head);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.ended {
            return Err(SinkError::Closed);
        }
        self.writes.push(chunk);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), SinkError> {
        self.ended = true;
        Ok(())
    }
}
