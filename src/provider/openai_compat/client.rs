//! OpenAI-compatible API client.

use super::request::{OpenAIMessage, OpenAIRequest};
use crate::protocol::ChatCompletion;
use crate::provider::client::{ChatBackend, NativeStream};
use crate::provider::error::Error;
use crate::provider::http::{AuthConfig, HttpClient, decode_sse_stream};
use crate::provider::types::{ChatMessage, CompletionParams, NativeResponse};
use async_trait::async_trait;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Client for any server speaking the OpenAI chat-completions API.
pub struct OpenAICompatClient {
    http: HttpClient,
    model: String,
}

impl OpenAICompatClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// An empty `api_key` sends no `Authorization` header (local servers).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: HttpClient::new(base_url, AuthConfig::Bearer(api_key.into())),
            model: model.into(),
        }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
        stream: bool,
    ) -> OpenAIRequest {
        OpenAIRequest {
            model: params.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream,
        }
    }
}

/// Decode a completion body. Some proxies double-encode it as a JSON string.
fn decode_completion(value: serde_json::Value) -> Result<ChatCompletion, Error> {
    let value = match value {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| Error::Parse(format!("{e}; body: {inner}")))?,
        other => other,
    };
    serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))
}

#[async_trait]
impl ChatBackend for OpenAICompatClient {
    fn id(&self) -> &'static str {
        "openai_compat"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeStream, Error> {
        let api_request = self.build_request(&messages, params, true);

        tracing::debug!(
            base_url = %self.http.base_url(),
            model = %api_request.model,
            messages = api_request.messages.len(),
            "OpenAI-compat stream request"
        );

        let body = self
            .http
            .post_stream(CHAT_COMPLETIONS_PATH, &api_request)
            .await?;
        Ok(decode_sse_stream(body))
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeResponse, Error> {
        let api_request = self.build_request(&messages, params, false);

        tracing::debug!(
            base_url = %self.http.base_url(),
            model = %api_request.model,
            messages = api_request.messages.len(),
            "OpenAI-compat request"
        );

        let value: serde_json::Value = self
            .http
            .post_json(CHAT_COMPLETIONS_PATH, &api_request)
            .await?;
        Ok(NativeResponse::Chat(decode_completion(value)?))
    }
}
