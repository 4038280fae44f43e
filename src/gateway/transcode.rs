//! Native unit to canonical chunk conversion.
//!
//! Total over every [`NativeUnit`]: a unit that matches no known shape becomes
//! an empty, non-terminal chunk, so one malformed unit never aborts a stream.

use crate::protocol::{ChatCompletion, ChatCompletionChunk, Usage, completion_id};
use crate::provider::gemini::GeminiResponse;
use crate::provider::{NativeResponse, NativeUnit};

/// Gemini's end-of-turn literal.
const GEMINI_STOP: &str = "STOP";

/// Per-response identity stamped on every synthesized chunk.
#[derive(Debug, Clone)]
pub struct Transcoder {
    id: String,
    created: i64,
    model: String,
}

impl Transcoder {
    /// Fresh id and creation time for one response.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_identity(completion_id(), chrono::Utc::now().timestamp(), model)
    }

    pub fn with_identity(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn canonicalize(&self, unit: NativeUnit) -> ChatCompletionChunk {
        match unit {
            NativeUnit::Chat(chunk) => chunk,
            NativeUnit::Gemini(response) => self.chunk(
                response.first_text().unwrap_or_default(),
                gemini_finish_reason(&response),
            ),
            NativeUnit::Text(text) => self.chunk(text, None),
            NativeUnit::Unknown(value) => {
                tracing::warn!(unit = %value, "Unrecognized stream unit, sending empty chunk");
                self.chunk(String::new(), None)
            }
        }
    }

    /// Re-shape a complete response. Usage is zero-filled when not reported.
    #[must_use]
    pub fn canonical_response(&self, response: NativeResponse) -> ChatCompletion {
        match response {
            NativeResponse::Chat(completion) => completion,
            NativeResponse::Gemini(response) => {
                let usage = response
                    .usage_metadata
                    .map(|u| {
                        let prompt_tokens = u.prompt_token_count.unwrap_or(0);
                        let completion_tokens = u.candidates_token_count.unwrap_or(0);
                        Usage {
                            prompt_tokens,
                            completion_tokens,
                            total_tokens: u
                                .total_token_count
                                .unwrap_or(prompt_tokens + completion_tokens),
                        }
                    })
                    .unwrap_or_default();
                let model = response
                    .model_version
                    .clone()
                    .unwrap_or_else(|| self.model.clone());
                ChatCompletion::assistant(&*self.id, self.created, model, response.text(), usage)
            }
        }
    }

    fn chunk(&self, content: impl Into<String>, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk::text(
            &*self.id,
            self.created,
            &*self.model,
            content,
            finish_reason,
        )
    }
}

fn gemini_finish_reason(response: &GeminiResponse) -> Option<String> {
    (response.finish_reason() == Some(GEMINI_STOP)).then(|| "stop".to_string())
}
