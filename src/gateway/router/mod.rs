//! Request routing.
//!
//! `Gateway::handle` takes a path, a body and a sink, and runs one request to
//! completion: route, resolve the backend, dispatch, write. Every failure
//! before output starts becomes a single status-coded JSON error body.

use super::emitter::SseEmitter;
use super::error::GatewayError;
use super::sink::ResponseSink;
use super::transcode::Transcoder;
use crate::config::{Config, ConfigError, DEFAULT_HISTORY_PATH};
use crate::conversation::LoadOutcome;
use crate::protocol::ChatCompletionRequest;
use crate::provider::{ChatMessage, ClientRegistry, ProviderClient, Role};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Messages included in a `conversation/status` preview.
const STATUS_PREVIEW_LEN: usize = 3;

/// Operation under `/{backend}/conversation/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationOp {
    Load,
    Clear,
    Status,
    Add,
}

impl ConversationOp {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "load" => Some(Self::Load),
            "clear" => Some(Self::Clear),
            "status" => Some(Self::Status),
            "add" => Some(Self::Add),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/{backend}/v1/chat/completions`
    ChatCompletions { backend: String },
    /// `/{backend}/conversation/{op}`
    Conversation { backend: String, op: ConversationOp },
}

impl Route {
    /// Parse a request path. The query string is ignored.
    pub fn parse(path: &str) -> Result<Self, GatewayError> {
        let path_only = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path_only.trim_matches('/').split('/').collect();

        let route = match segments.as_slice() {
            [backend, "v1", "chat", "completions"] if !backend.is_empty() => {
                Some(Route::ChatCompletions {
                    backend: (*backend).to_string(),
                })
            }
            [backend, "conversation", op] if !backend.is_empty() => ConversationOp::from_segment(op)
                .map(|op| Route::Conversation {
                    backend: (*backend).to_string(),
                    op,
                }),
            _ => None,
        };

        route.ok_or_else(|| GatewayError::RouteNotFound(path_only.to_string()))
    }

    #[must_use]
    pub fn backend(&self) -> &str {
        match self {
            Route::ChatCompletions { backend } | Route::Conversation { backend, .. } => backend,
        }
    }
}

/// Body of `conversation/load`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadRequest {
    #[serde(default, alias = "file_path", alias = "path")]
    file_path: Option<PathBuf>,
}

/// Body of `conversation/add`.
#[derive(Debug, Default, Deserialize)]
struct AddRequest {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Response of every `conversation/*` operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_messages: Option<Vec<ChatMessage>>,
}

/// The routing core shared by every transport.
#[derive(Debug)]
pub struct Gateway {
    registry: ClientRegistry,
    history_path: PathBuf,
    record_history: bool,
}

impl Gateway {
    #[must_use]
    pub fn new(registry: ClientRegistry) -> Self {
        Self {
            registry,
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            record_history: true,
        }
    }

    /// Conversation file used by `conversation/load` when the body names none.
    #[must_use]
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    #[must_use]
    pub fn with_record_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry =
            ClientRegistry::new(config.backend_settings()?).with_history_limit(config.history_limit);
        Ok(Self::new(registry)
            .with_history_path(config.history_path.clone())
            .with_record_history(config.record_history))
    }

    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Handle one request, writing the whole response to `sink`.
    pub async fn handle<S: ResponseSink + ?Sized>(&self, path: &str, body: &str, sink: &mut S) {
        if let Err(err) = self.dispatch(path, body, sink).await {
            tracing::warn!(path, status = err.status_code(), "Request failed: {err}");
            SseEmitter::new(sink).emit_error(&err).await;
        }
    }

    /// Returns `Err` only when nothing has been written to `sink`.
    async fn dispatch<S: ResponseSink + ?Sized>(
        &self,
        path: &str,
        body: &str,
        sink: &mut S,
    ) -> Result<(), GatewayError> {
        let route = Route::parse(path)?;
        let client = self.registry.resolve(route.backend())?;

        match route {
            Route::ChatCompletions { .. } => self.chat(&client, body, sink).await,
            Route::Conversation { op, .. } => {
                let response = self.conversation(&client, op, body).await?;
                respond_json(sink, &response).await;
                Ok(())
            }
        }
    }

    async fn chat<S: ResponseSink + ?Sized>(
        &self,
        client: &Arc<ProviderClient>,
        body: &str,
        sink: &mut S,
    ) -> Result<(), GatewayError> {
        let request: ChatCompletionRequest = serde_json::from_str(body)
            .map_err(|e| GatewayError::MalformedRequest(format!("invalid JSON body: {e}")))?;
        let turns = request.turns().ok_or_else(|| {
            GatewayError::MalformedRequest("body has neither `messages` nor `message`".into())
        })?;
        let params = request.params();
        let model = params
            .model
            .clone()
            .unwrap_or_else(|| client.model().to_string());
        let transcoder = Transcoder::new(model);

        tracing::debug!(
            backend = client.name(),
            stream = request.stream,
            turns = turns.len(),
            "Chat completion"
        );

        // A `messages` array already carries the caller's own context, so only
        // single-message requests lean on the stored history.
        let record = self.record_history && request.is_single_message();

        if request.stream {
            let units = client.complete_streaming(&turns, &params).await?;
            let outcome = SseEmitter::new(sink).emit_stream(units, &transcoder).await;
            if record && outcome.completed {
                record_exchange(client, &turns, &outcome.content);
            }
        } else {
            let response = client.complete_non_streaming(&turns, &params).await?;
            let completion = transcoder.canonical_response(response);
            if record {
                record_exchange(client, &turns, completion.content());
            }
            respond_json(sink, &completion).await;
        }
        Ok(())
    }

    async fn conversation(
        &self,
        client: &ProviderClient,
        op: ConversationOp,
        body: &str,
    ) -> Result<ConversationResponse, GatewayError> {
        let response = match op {
            ConversationOp::Load => {
                let request: LoadRequest = parse_optional_body(body)?;
                let path = request
                    .file_path
                    .unwrap_or_else(|| self.history_path.clone());
                let (success, message) = match client.load_history(&path).await {
                    LoadOutcome::Loaded(count) => (
                        true,
                        format!("Loaded {count} messages from {}", path.display()),
                    ),
                    LoadOutcome::Missing => (
                        false,
                        format!("No conversation file at {}; history unchanged", path.display()),
                    ),
                    LoadOutcome::Invalid(reason) => (
                        false,
                        format!("Could not read {}: {reason}; history cleared", path.display()),
                    ),
                };
                ConversationResponse {
                    success,
                    message: Some(message),
                    history_length: Some(client.history_len()),
                    last_messages: None,
                }
            }
            ConversationOp::Clear => {
                client.clear_history();
                ConversationResponse {
                    success: true,
                    message: Some("Conversation history cleared".to_string()),
                    history_length: None,
                    last_messages: None,
                }
            }
            ConversationOp::Status => ConversationResponse {
                success: true,
                message: None,
                history_length: Some(client.history_len()),
                last_messages: Some(client.history_tail(STATUS_PREVIEW_LEN)),
            },
            ConversationOp::Add => {
                let request: AddRequest = parse_optional_body(body)?;
                let (Some(role), Some(content)) = (request.role, request.content) else {
                    return Err(GatewayError::MalformedRequest(
                        "`role` and `content` are required".into(),
                    ));
                };
                let role = Role::from_name(&role).ok_or_else(|| {
                    GatewayError::MalformedRequest(format!("unknown role `{role}`"))
                })?;
                client.append_to_history(role, content);
                ConversationResponse {
                    success: true,
                    message: Some(format!("Added {} message", role.as_str())),
                    history_length: Some(client.history_len()),
                    last_messages: None,
                }
            }
        };
        Ok(response)
    }
}

fn record_exchange(client: &ProviderClient, turns: &[ChatMessage], reply: &str) {
    if let Some(prompt) = turns.last() {
        client.record_exchange(prompt, reply);
    }
}

/// Parse a JSON body where an empty body means "all defaults".
fn parse_optional_body<T: Default + for<'de> Deserialize<'de>>(
    body: &str,
) -> Result<T, GatewayError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedRequest(format!("invalid JSON body: {e}")))
}

async fn respond_json<S, T>(sink: &mut S, body: &T)
where
    S: ResponseSink + ?Sized,
    T: Serialize + Sync,
{
    if let Err(e) = SseEmitter::new(sink).emit_json(200, body).await {
        tracing::debug!("Response not delivered: {e}");
    }
}
