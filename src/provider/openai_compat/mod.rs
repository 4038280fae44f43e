//! OpenAI-compatible API client.
//!
//! Serves any backend configured with a base URL: OpenAI itself, Replicate,
//! OpenRouter, Groq, vLLM, Ollama and friends.

mod client;
mod request;

pub use client::OpenAICompatClient;
