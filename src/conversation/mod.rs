//! Per-backend conversation history.
//!
//! The store is an ordered message log merged in front of every outgoing
//! request. It is only read from disk through [`ConversationStore::load`];
//! nothing here ever writes the file back.

use crate::provider::gemini::GeminiContent;
use crate::provider::{ChatMessage, Role};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How entries in a conversation file are shaped.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFormat {
    /// `{role, content}` entries.
    #[default]
    #[serde(alias = "openai")]
    Canonical,
    /// `{role: "user"|"model", parts: [{text}]}` entries.
    #[serde(alias = "gemini")]
    Native,
}

/// On-disk conversation file.
#[derive(Debug, Deserialize)]
pub struct ConversationFile {
    #[serde(default)]
    pub format: HistoryFormat,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, alias = "history")]
    pub conversation_history: Vec<Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ConversationFile {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Convert entries to canonical messages.
    ///
    /// Native entries with no text are dropped; a malformed canonical entry
    /// fails the whole file.
    pub fn into_messages(self) -> Result<Vec<ChatMessage>, serde_json::Error> {
        match self.format {
            HistoryFormat::Canonical => self
                .conversation_history
                .into_iter()
                .map(serde_json::from_value)
                .collect(),
            HistoryFormat::Native => {
                let mut messages = Vec::with_capacity(self.conversation_history.len());
                for entry in self.conversation_history {
                    let content: GeminiContent = serde_json::from_value(entry)?;
                    if let Some(message) = native_to_message(content) {
                        messages.push(message);
                    }
                }
                Ok(messages)
            }
        }
    }
}

fn native_to_message(content: GeminiContent) -> Option<ChatMessage> {
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        return None;
    }
    let role = match content.role.as_deref() {
        Some("model") => Role::Assistant,
        Some(name) => match Role::from_name(name) {
            Some(Role::Assistant) => Role::Assistant,
            Some(Role::System) => Role::System,
            _ => Role::User,
        },
        None => Role::User,
    };
    Some(ChatMessage::new(role, text))
}

/// Result of [`ConversationStore::load`]. Loading never fails the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// History replaced with this many messages.
    Loaded(usize),
    /// No file at the path; history untouched.
    Missing,
    /// File unreadable or unparseable; history cleared.
    Invalid(String),
}

/// Messages kept per backend unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Ordered message log shared by all requests to one backend.
///
/// Holds at most `limit` messages; the oldest are dropped first. A limit of
/// zero means unbounded.
#[derive(Debug)]
pub struct ConversationStore {
    messages: Mutex<Vec<ChatMessage>>,
    limit: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            limit,
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trim(&self, messages: &mut Vec<ChatMessage>) {
        if self.limit > 0 && messages.len() > self.limit {
            let excess = messages.len() - self.limit;
            messages.drain(..excess);
        }
    }

    /// Replace the history with the contents of a conversation file.
    pub async fn load(&self, path: &Path) -> LoadOutcome {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No conversation file");
                return LoadOutcome::Missing;
            }
            Err(e) => return self.reject(path, e.to_string()),
        };

        match ConversationFile::parse(&text).and_then(ConversationFile::into_messages) {
            Ok(mut messages) => {
                self.trim(&mut messages);
                let count = messages.len();
                *self.lock() = messages;
                tracing::info!(path = %path.display(), count, "Loaded conversation history");
                LoadOutcome::Loaded(count)
            }
            Err(e) => self.reject(path, e.to_string()),
        }
    }

    fn reject(&self, path: &Path, reason: String) -> LoadOutcome {
        tracing::warn!(path = %path.display(), "Discarding conversation history: {reason}");
        self.clear();
        LoadOutcome::Invalid(reason)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn append(&self, message: ChatMessage) {
        let mut messages = self.lock();
        messages.push(message);
        self.trim(&mut messages);
    }

    /// Independent copy of the current history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Last `n` messages, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<ChatMessage> {
        let messages = self.lock();
        messages[messages.len().saturating_sub(n)..].to_vec()
    }

    /// Stored history followed by `incoming`, in order.
    #[must_use]
    pub fn merge(&self, incoming: &[ChatMessage]) -> Vec<ChatMessage> {
        let messages = self.lock();
        let mut merged = Vec::with_capacity(messages.len() + incoming.len());
        merged.extend_from_slice(&messages);
        merged.extend_from_slice(incoming);
        merged
    }
}
