//! OpenAI-compatible API request types.

use serde::Serialize;

/// Top-level request to OpenAI-compatible APIs.
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

/// A message in the conversation.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OpenAIMessage {
    pub role: &'static str,
    pub content: String,
}
