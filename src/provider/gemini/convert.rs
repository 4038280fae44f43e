//! Conversion from canonical messages to Gemini requests.

use super::types::{GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest};
use crate::provider::types::{ChatMessage, CompletionParams, Role};

impl GeminiRequest {
    pub(crate) fn from_messages(messages: &[ChatMessage], params: &CompletionParams) -> Self {
        let mut contents = Vec::new();
        let mut system_text: Vec<&str> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if !msg.content.is_empty() {
                        system_text.push(&msg.content);
                    }
                }
                Role::User | Role::Assistant => {
                    let role = if msg.role == Role::Assistant {
                        "model"
                    } else {
                        "user"
                    };
                    contents.push(GeminiContent {
                        role: Some(role.to_string()),
                        parts: vec![GeminiPart {
                            text: Some(msg.content.clone()),
                        }],
                    });
                }
            }
        }

        let system_instruction = (!system_text.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(system_text.join("\n")),
            }],
        });

        let generation_config = (params.temperature.is_some() || params.max_tokens.is_some())
            .then(|| GeminiGenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            });

        Self {
            contents,
            system_instruction,
            generation_config,
        }
    }
}
