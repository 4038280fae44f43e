//! Shared types for LLM providers.

use super::gemini::GeminiResponse;
use crate::protocol::{ChatCompletion, ChatCompletionChunk};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "developer")]
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a role name as accepted on the wire.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "system" | "developer" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "content_text")]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Message content - a string, `null`, or an array of content parts.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
}

/// Flatten text parts into one string; non-text parts are dropped.
fn content_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WireContent>::deserialize(deserializer)? {
        None => String::new(),
        Some(WireContent::Text(text)) => text,
        Some(WireContent::Parts(parts)) => parts.into_iter().filter_map(|p| p.text).collect(),
    })
}

/// Per-request knobs forwarded to the upstream in its own dialect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionParams {
    /// Overrides the backend's configured model when set.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// One unit of a backend's incremental response, before canonicalization.
#[derive(Debug, Clone)]
pub enum NativeUnit {
    /// OpenAI-compatible chunk (has a `choices` array).
    Chat(ChatCompletionChunk),
    /// Gemini increment (has a `candidates` array).
    Gemini(GeminiResponse),
    /// Raw text.
    Text(String),
    /// Anything else.
    Unknown(Value),
}

impl NativeUnit {
    /// Classify a decoded upstream value. Total: never fails.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        if value.get("choices").is_some_and(Value::is_array) {
            return match serde_json::from_value::<ChatCompletionChunk>(value.clone()) {
                Ok(chunk) => NativeUnit::Chat(chunk),
                Err(_) => NativeUnit::Unknown(value),
            };
        }
        if value.get("candidates").is_some_and(Value::is_array) {
            return match serde_json::from_value::<GeminiResponse>(value.clone()) {
                Ok(response) => NativeUnit::Gemini(response),
                Err(_) => NativeUnit::Unknown(value),
            };
        }
        match value {
            Value::String(text) => NativeUnit::Text(text),
            other => NativeUnit::Unknown(other),
        }
    }
}

/// A backend's complete, non-streaming response.
#[derive(Debug, Clone)]
pub enum NativeResponse {
    Chat(ChatCompletion),
    Gemini(GeminiResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_aliases() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"developer","content":"Be brief"}"#).unwrap();
        assert_eq!(msg.role, Role::System);
        assert_eq!(Role::from_name("Assistant"), Some(Role::Assistant));
        assert_eq!(Role::from_name("tool"), None);
    }

    #[test]
    fn test_content_parts_flattened() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":[{"type":"text","text":"Hello "},{"type":"image_url","image_url":{"url":"x"}},{"type":"text","text":"there"}]}"#,
        )
        .unwrap();
        assert_eq!(msg.content, "Hello there");
    }

    #[test]
    fn test_null_content() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":null}"#).unwrap();
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_classify_chat_chunk() {
        let unit = NativeUnit::from_json(json!({
            "id": "c", "object": "chat.completion.chunk", "created": 1, "model": "m",
            "choices": [{"index": 0, "delta": {"content": "Hi"}, "finish_reason": null}]
        }));
        assert!(matches!(unit, NativeUnit::Chat(ref c) if c.content() == "Hi"));
    }

    #[test]
    fn test_classify_gemini_chunk() {
        let unit = NativeUnit::from_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hi"}]}}]
        }));
        assert!(matches!(unit, NativeUnit::Gemini(_)));
    }

    #[test]
    fn test_classify_text_and_unknown() {
        assert!(matches!(
            NativeUnit::from_json(json!("plain")),
            NativeUnit::Text(ref t) if t == "plain"
        ));
        assert!(matches!(NativeUnit::from_json(json!({})), NativeUnit::Unknown(_)));
        assert!(matches!(
            NativeUnit::from_json(json!({"choices": "not-an-array"})),
            NativeUnit::Unknown(_)
        ));
    }
}
