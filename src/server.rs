//! HTTP transport.
//!
//! Every request except `/health` is handed to [`Gateway::handle`] as a
//! path, a body and a [`ChannelSink`]. The handler waits for the response
//! head, then streams the body out of the channel as it is written.

use crate::gateway::{Gateway, ResponseHead, ResponseSink, SinkError};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// Body chunks buffered between the gateway and the socket.
const BODY_BUFFER: usize = 32;

type BodyChunk = Result<Bytes, Infallible>;

/// Sink backed by a oneshot (head) and a bounded channel (body).
///
/// `write` waits for channel capacity, so a slow reader slows the upstream.
/// Once the response is dropped, writes fail with [`SinkError::Closed`].
pub struct ChannelSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: Option<mpsc::Sender<BodyChunk>>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(head: oneshot::Sender<ResponseHead>, body: mpsc::Sender<BodyChunk>) -> Self {
        Self {
            head: Some(head),
            body: Some(body),
        }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn start(&mut self, head: ResponseHead) -> Result<(), SinkError> {
        let sender = self.head.take().ok_or(SinkError::AlreadyStarted)?;
        sender.send(head).map_err(|_| SinkError::Closed)
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let sender = self.body.as_ref().ok_or(SinkError::Closed)?;
        sender.send(Ok(chunk)).await.map_err(|_| SinkError::Closed)
    }

    async fn end(&mut self) -> Result<(), SinkError> {
        self.body = None;
        Ok(())
    }
}

/// Axum router serving the gateway.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_handler))
        .fallback(gateway_handler)
        .with_state(gateway)
}

/// Bind `listen` and serve until the process is stopped.
pub async fn serve(gateway: Gateway, listen: &str) -> crate::Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|source| crate::Error::Bind {
            addr: listen.to_string(),
            source,
        })?;

    tracing::info!(
        addr = %listener.local_addr()?,
        backends = ?gateway.registry().backends(),
        "Gateway listening"
    );

    axum::serve(listener, router(Arc::new(gateway))).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn gateway_handler(State(gateway): State<Arc<Gateway>>, uri: Uri, body: String) -> Response {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_BUFFER);

    tokio::spawn(async move {
        let mut sink = ChannelSink::new(head_tx, body_tx);
        gateway.handle(&path, &body, &mut sink).await;
    });

    match head_rx.await {
        Ok(head) => {
            let status = StatusCode::from_u16(head.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [
                    (CONTENT_TYPE, HeaderValue::from_static(head.content_type)),
                    (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
                ],
                Body::from_stream(ReceiverStream::new(body_rx)),
            )
                .into_response()
        }
        // The gateway always starts a response; this only happens if it panicked
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
