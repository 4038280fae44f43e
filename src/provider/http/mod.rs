//! Shared HTTP utilities for LLM providers.

mod client;
mod sse;

pub use client::{AuthConfig, HttpClient};
pub use sse::{SseEvent, SseParser};

use crate::provider::error::{Error, format_api_error};
use crate::provider::types::NativeUnit;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Decode an upstream SSE body into native units.
///
/// Blank payloads and the `[DONE]` marker are skipped. A payload that is not
/// JSON becomes a raw text unit. An `error` object sent mid-stream ends the
/// sequence with an error, as does a transport failure.
pub fn decode_sse_stream<S>(body: S) -> BoxStream<'static, Result<NativeUnit, Error>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let mut parser = SseParser::new();
    let mut failed = false;

    body.map(Some)
        .chain(stream::once(async { None }))
        .flat_map(move |item| {
            let events = match item {
                _ if failed => Vec::new(),
                Some(Ok(bytes)) => parser.feed(&bytes).into_iter().map(Ok).collect(),
                Some(Err(e)) => {
                    failed = true;
                    vec![Err(Error::Stream(e.to_string()))]
                }
                None => {
                    if parser.has_pending() {
                        tracing::debug!("Upstream body ended mid-event, flushing");
                    }
                    parser.finish().into_iter().map(Ok).collect()
                }
            };
            stream::iter(events)
        })
        .filter_map(|event| async move {
            match event {
                Err(e) => Some(Err(e)),
                Ok(event) if event.data.trim().is_empty() || event.is_done() => None,
                Ok(event) => Some(decode_event(event)),
            }
        })
        .scan(false, |errored, item| {
            // Nothing is forwarded after the first error
            if *errored {
                return futures::future::ready(None);
            }
            *errored = item.is_err();
            futures::future::ready(Some(item))
        })
        .boxed()
}

fn decode_event(event: SseEvent) -> Result<NativeUnit, Error> {
    if event.event.as_deref() == Some("error") {
        return Err(Error::Stream(format_api_error(&event.data)));
    }
    match serde_json::from_str::<serde_json::Value>(&event.data) {
        Ok(value) => {
            if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map_or_else(|| error.to_string(), ToString::to_string);
                return Err(Error::Stream(message));
            }
            Ok(NativeUnit::from_json(value))
        }
        Err(_) => Ok(NativeUnit::Text(event.data)),
    }
}
