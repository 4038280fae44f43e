//! Google Gemini provider (native variant).

mod client;
mod convert;
mod types;

pub use client::GeminiClient;
pub use types::{GeminiCandidate, GeminiContent, GeminiPart, GeminiResponse, GeminiUsageMetadata};
