//! Provider client: one backend plus its conversation history.

use super::error::Error;
use super::gemini::GeminiClient;
use super::openai_compat::OpenAICompatClient;
use super::types::{ChatMessage, CompletionParams, NativeResponse, NativeUnit, Role};
use crate::config::BackendSettings;
use crate::conversation::{ConversationStore, LoadOutcome};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// Lazy sequence of native units from one streaming call.
pub type NativeStream = BoxStream<'static, Result<NativeUnit, Error>>;

/// The one behavioral contract every backend variant implements.
///
/// Shape differences stay behind this trait: callers only ever see
/// [`NativeUnit`] and [`NativeResponse`], which the gateway canonicalizes.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Variant identifier, for logs.
    fn id(&self) -> &'static str;

    /// Configured model.
    fn model(&self) -> &str;

    /// Open a streaming completion. Fails before yielding anything when the
    /// request cannot be sent or the upstream rejects it.
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeStream, Error>;

    /// Single blocking completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeResponse, Error>;
}

/// Long-lived client for one configured backend.
pub struct ProviderClient {
    name: String,
    backend: Box<dyn ChatBackend>,
    history: ConversationStore,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("name", &self.name)
            .field("backend", &self.backend.id())
            .field("model", &self.backend.model())
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl ProviderClient {
    pub fn new(name: impl Into<String>, backend: Box<dyn ChatBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
            history: ConversationStore::new(),
        }
    }

    /// Replace the (empty) history with one capped at `limit` messages.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history = ConversationStore::with_limit(limit);
        self
    }

    /// Build the variant matching the settings shape.
    pub fn from_settings(name: impl Into<String>, settings: &BackendSettings) -> Self {
        let backend: Box<dyn ChatBackend> = match settings {
            BackendSettings::OpenAiCompatible {
                base_url,
                api_key,
                model,
            } => Box::new(OpenAICompatClient::new(base_url, api_key, model)),
            BackendSettings::Native { api_key, model } => {
                Box::new(GeminiClient::new(api_key, model))
            }
        };
        Self::new(name, backend)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Stored history followed by the caller's messages.
    #[must_use]
    pub fn merge_history(&self, incoming: &[ChatMessage]) -> Vec<ChatMessage> {
        self.history.merge(incoming)
    }

    pub async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<NativeStream, Error> {
        let merged = self.merge_history(messages);
        tracing::debug!(
            backend = %self.name,
            variant = self.backend.id(),
            messages = merged.len(),
            "Opening stream"
        );
        self.backend.stream(merged, params).await
    }

    pub async fn complete_non_streaming(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<NativeResponse, Error> {
        let merged = self.merge_history(messages);
        tracing::debug!(
            backend = %self.name,
            variant = self.backend.id(),
            messages = merged.len(),
            "Sending completion"
        );
        self.backend.complete(merged, params).await
    }

    /// Best-effort load; see [`ConversationStore::load`].
    pub async fn load_history(&self, path: &Path) -> LoadOutcome {
        self.history.load(path).await
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    pub fn append_to_history(&self, role: Role, content: impl Into<String>) {
        self.history.append(ChatMessage::new(role, content));
    }

    #[must_use]
    pub fn snapshot_history(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn history_tail(&self, n: usize) -> Vec<ChatMessage> {
        self.history.tail(n)
    }

    /// Remember a completed turn so later requests are primed with it.
    pub fn record_exchange(&self, prompt: &ChatMessage, reply: &str) {
        self.history.append(prompt.clone());
        self.history.append(ChatMessage::assistant(reply));
    }
}
