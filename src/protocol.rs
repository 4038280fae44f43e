//! Canonical (OpenAI-style) wire types.
//!
//! Every response the gateway produces is one of these shapes, regardless of
//! which backend served it. Unknown fields sent by OpenAI-compatible upstreams
//! are kept in `extra` maps so pass-through re-serialization is lossless.

use crate::provider::{ChatMessage, CompletionParams};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const COMPLETION_OBJECT: &str = "chat.completion";

fn chunk_object() -> String {
    CHUNK_OBJECT.to_string()
}

fn completion_object() -> String {
    COMPLETION_OBJECT.to_string()
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Generate a completion id in the `chatcmpl-` namespace.
#[must_use]
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Inbound chat-completion request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    /// Legacy single-message form, used only when `messages` is absent.
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    /// The conversation turns carried by this request.
    ///
    /// Returns `None` when the body carries no usable message.
    #[must_use]
    pub fn turns(&self) -> Option<Vec<ChatMessage>> {
        match (&self.messages, &self.message) {
            (Some(messages), _) if !messages.is_empty() => Some(messages.clone()),
            (None, Some(message)) => Some(vec![message.clone()]),
            _ => None,
        }
    }

    /// True when the body uses the legacy single `message` form.
    #[must_use]
    pub fn is_single_message(&self) -> bool {
        self.messages.is_none() && self.message.is_some()
    }

    #[must_use]
    pub fn params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone().filter(|m| !m.trim().is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Streaming chunk (`chat.completion.chunk`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default = "chunk_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionChunk {
    /// Build a single-choice text chunk.
    #[must_use]
    pub fn text(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: chunk_object(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(content.into()),
                    extra: Map::new(),
                },
                finish_reason,
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }

    /// Delta text of the first choice, empty when absent.
    #[must_use]
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }
}

/// Non-streaming response (`chat.completion`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default = "completion_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    /// Always present; zero-filled when the backend reports nothing.
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Usage,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMessage {
    #[serde(default = "assistant_role")]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[allow(clippy::struct_field_names)] // Field names match the wire format
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl ChatCompletion {
    /// Build a single-choice assistant response finished with `stop`.
    #[must_use]
    pub fn assistant(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        content: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: completion_object(),
            created,
            model: model.into(),
            choices: vec![CompletionChoice {
                index: 0,
                message: ResponseMessage {
                    role: assistant_role(),
                    content: Some(content.into()),
                    extra: Map::new(),
                },
                finish_reason: Some("stop".to_string()),
                extra: Map::new(),
            }],
            usage,
            extra: Map::new(),
        }
    }

    /// Text of the first choice's message, empty when absent.
    #[must_use]
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
    }
}
