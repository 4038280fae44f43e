//! LLM provider abstraction.
//!
//! Two backend variants sit behind the [`ChatBackend`] trait: any
//! OpenAI-compatible REST API, and Google's Gemini API. A [`ProviderClient`]
//! pairs a backend with its conversation history, and the [`ClientRegistry`]
//! keeps one client per configured backend id.
//!
//! # Example
//!
//! ```ignore
//! use llm_gateway::provider::{ChatMessage, ClientRegistry, CompletionParams};
//!
//! let client = registry.resolve("acme")?;
//! let response = client
//!     .complete_non_streaming(&[ChatMessage::user("Hi")], &CompletionParams::default())
//!     .await?;
//! ```

mod client;
mod error;
pub mod gemini;
mod http;
mod openai_compat;
mod registry;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::{ChatBackend, NativeStream, ProviderClient};
pub use error::{Error, format_api_error};
pub use gemini::GeminiClient;
pub use openai_compat::OpenAICompatClient;
pub use registry::{ClientRegistry, UnknownBackend};
pub use types::*;
