//! Frames canonical records onto a response sink.
//!
//! A streaming response always ends with [`DONE_FRAME`] followed by `end`,
//! whether the upstream finished cleanly or failed mid-stream. Errors raised
//! before a stream opens never reach this path; they go out via
//! [`SseEmitter::emit_error`] instead.

use super::error::GatewayError;
use super::sink::{ResponseHead, ResponseSink, SinkError};
use super::transcode::Transcoder;
use crate::provider::NativeStream;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;

/// Terminal stream marker.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// `data: <json>\n\n`
pub fn sse_frame<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// What happened while forwarding a stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Chunks written to the sink.
    pub chunks: usize,
    /// Concatenated delta content of the written chunks.
    pub content: String,
    /// The upstream sequence ran to its end without error.
    pub completed: bool,
    /// The sink stopped accepting writes.
    pub disconnected: bool,
}

pub struct SseEmitter<'a, S: ResponseSink + ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: ResponseSink + ?Sized> SseEmitter<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Forward every unit as a canonical chunk, then the sentinel, then close.
    ///
    /// Each write is awaited before the next unit is pulled. A sink that has
    /// gone away stops the forwarding and drops the upstream stream.
    pub async fn emit_stream(
        &mut self,
        units: NativeStream,
        transcoder: &Transcoder,
    ) -> StreamOutcome {
        let mut outcome = StreamOutcome::default();

        match self.sink.start(ResponseHead::event_stream()).await {
            Ok(()) => self.forward(units, transcoder, &mut outcome).await,
            Err(e) => {
                tracing::warn!("Could not start event stream: {e}");
                outcome.disconnected = true;
            }
        }

        if let Err(e) = self.sink.write(Bytes::from_static(DONE_FRAME.as_bytes())).await {
            tracing::debug!("Sentinel not delivered: {e}");
            outcome.disconnected = true;
        }
        if let Err(e) = self.sink.end().await {
            tracing::debug!("Sink close failed: {e}");
        }

        tracing::debug!(
            id = transcoder.id(),
            chunks = outcome.chunks,
            completed = outcome.completed,
            disconnected = outcome.disconnected,
            "Stream finished"
        );
        outcome
    }

    async fn forward(
        &mut self,
        mut units: NativeStream,
        transcoder: &Transcoder,
        outcome: &mut StreamOutcome,
    ) {
        while let Some(item) = units.next().await {
            let unit = match item {
                Ok(unit) => unit,
                Err(e) => {
                    tracing::warn!(id = transcoder.id(), "Upstream stream failed: {e}");
                    return;
                }
            };

            let chunk = transcoder.canonicalize(unit);
            let frame = match sse_frame(&chunk) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Dropping unserializable chunk: {e}");
                    continue;
                }
            };

            if let Err(e) = self.sink.write(frame).await {
                tracing::info!(id = transcoder.id(), "Client went away: {e}");
                outcome.disconnected = true;
                return;
            }
            outcome.chunks += 1;
            outcome.content.push_str(chunk.content());
        }
        outcome.completed = true;
    }

    /// Write one JSON body and close.
    pub async fn emit_json<T: Serialize + Sync>(
        &mut self,
        status: u16,
        body: &T,
    ) -> Result<(), SinkError> {
        let bytes = serde_json::to_vec(body)?;
        self.sink.start(ResponseHead::json(status)).await?;
        self.sink.write(Bytes::from(bytes)).await?;
        self.sink.end().await
    }

    /// Write the error body for a failure raised before any output.
    pub async fn emit_error(&mut self, err: &GatewayError) {
        let status = err.status_code();
        if let Err(e) = self.emit_json(status, &err.to_body()).await {
            tracing::debug!(status, "Error response not delivered: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::sink::MemorySink;
    use crate::provider::{Error, NativeUnit};
    use async_trait::async_trait;
    use futures::stream;

    fn transcoder() -> Transcoder {
        Transcoder::with_identity("chatcmpl-e", 1, "m")
    }

    fn units(items: Vec<Result<NativeUnit, Error>>) -> NativeStream {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_stream_ends_with_sentinel() {
        let mut sink = MemorySink::new();
        let outcome = SseEmitter::new(&mut sink)
            .emit_stream(
                units(vec![
                    Ok(NativeUnit::Text("Pa".into())),
                    Ok(NativeUnit::Text("ris".into())),
                ]),
                &transcoder(),
            )
            .await;

        assert_eq!(sink.head, Some(ResponseHead::event_stream()));
        assert_eq!(sink.writes.len(), 3);
        assert!(sink.writes[0].starts_with(b"data: {"));
        assert!(sink.writes[0].ends_with(b"\n\n"));
        assert_eq!(sink.writes.last().unwrap().as_ref(), DONE_FRAME.as_bytes());
        assert!(sink.ended);
        assert_eq!(outcome.content, "Paris");
        assert!(outcome.completed);
        assert_eq!(outcome.chunks, 2);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_still_ends_with_sentinel() {
        let mut sink = MemorySink::new();
        let outcome = SseEmitter::new(&mut sink)
            .emit_stream(
                units(vec![
                    Ok(NativeUnit::Text("partial".into())),
                    Err(Error::Stream("connection reset".into())),
                    Ok(NativeUnit::Text("never".into())),
                ]),
                &transcoder(),
            )
            .await;

        assert_eq!(sink.writes.len(), 2);
        assert_eq!(sink.writes[1].as_ref(), DONE_FRAME.as_bytes());
        assert!(sink.ended);
        assert!(!outcome.completed);
        assert_eq!(outcome.content, "partial");
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut sink = MemorySink::new();
        SseEmitter::new(&mut sink)
            .emit_stream(units(Vec::new()), &transcoder())
            .await;
        assert_eq!(sink.body(), DONE_FRAME);
        assert!(sink.ended);
    }

    /// Accepts `capacity` writes, then reports the reader gone.
    struct ClosingSink {
        capacity: usize,
        inner: MemorySink,
    }

    #[async_trait]
    impl ResponseSink for ClosingSink {
        async fn start(&mut self, head: ResponseHead) -> Result<(), SinkError> {
            self.inner.start(head).await
        }

        async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
            if self.inner.writes.len() >= self.capacity {
                return Err(SinkError::Closed);
            }
            self.inner.write(chunk).await
        }

        async fn end(&mut self) -> Result<(), SinkError> {
            self.inner.end().await
        }
    }

    #[tokio::test]
    async fn test_disconnect_stops_forwarding() {
        let mut sink = ClosingSink {
            capacity: 1,
            inner: MemorySink::new(),
        };
        let outcome = SseEmitter::new(&mut sink)
            .emit_stream(
                units(vec![
                    Ok(NativeUnit::Text("a".into())),
                    Ok(NativeUnit::Text("b".into())),
                    Ok(NativeUnit::Text("c".into())),
                ]),
                &transcoder(),
            )
            .await;

        assert!(outcome.disconnected);
        assert!(!outcome.completed);
        assert_eq!(outcome.chunks, 1);
        assert!(sink.inner.ended);
    }

    #[tokio::test]
    async fn test_emit_json_single_write() {
        let mut sink = MemorySink::new();
        SseEmitter::new(&mut sink)
            .emit_json(200, &serde_json::json!({"ok": true}))
            .await
            .unwrap();

        assert_eq!(sink.head, Some(ResponseHead::json(200)));
        assert_eq!(sink.writes.len(), 1);
        assert_eq!(sink.body(), r#"{"ok":true}"#);
        assert!(sink.ended);
    }

    #[tokio::test]
    async fn test_emit_error() {
        let mut sink = MemorySink::new();
        SseEmitter::new(&mut sink)
            .emit_error(&GatewayError::RouteNotFound("/x".into()))
            .await;

        assert_eq!(sink.status(), Some(404));
        let body: serde_json::Value = serde_json::from_str(&sink.body()).unwrap();
        assert_eq!(body["error"]["code"], 404);
    }
}
