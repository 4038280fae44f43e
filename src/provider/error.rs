//! Provider error types.

use thiserror::Error;

/// Format an upstream error body for display, extracting the message from JSON if present.
///
/// Handles common patterns:
/// - `{"error": {"message": "...", "code": "..."}}` → message with code
/// - `[{"error": {"message": "...", "status": "..."}}]` → first element (Gemini)
/// - Plain text errors → returned as-is
#[must_use]
pub fn format_api_error(body: &str) -> String {
    let trimmed = body.trim();
    if let Some(json_start) = trimmed.find(['{', '[']) {
        let json_str = &trimmed[json_start..];

        if let Ok(json) = serde_json::from_str::<serde_json::Value>(json_str) {
            // Gemini wraps streaming errors in a one-element array
            let json = match json {
                serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                other => other,
            };
            if let Some(msg) = extract_error_message(&json) {
                let prefix = trimmed[..json_start].trim();
                if prefix.is_empty() {
                    return msg;
                }
                return format!("{prefix} {msg}");
            }
        }
    }

    trimmed.to_string()
}

/// Extract user-friendly message from JSON error response.
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    if let Some(error_obj) = json.get("error") {
        if let Some(msg) = error_obj.get("message").and_then(|v| v.as_str()) {
            let mut result = msg.to_string();

            if let Some(code) = error_obj.get("code").and_then(|v| v.as_str()) {
                result = format!("{result} (code: {code})");
            } else if let Some(status) = error_obj.get("status").and_then(|v| v.as_str()) {
                result = format!("{result} (status: {status})");
            }

            return Some(result);
        }

        if let Some(msg) = error_obj.as_str() {
            return Some(msg.to_string());
        }
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),

    /// The request was refused locally and never sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// HTTP status reported by the upstream, when one is known.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_openai_error() {
        let body = r#"{"error":{"message":"Rate limit exceeded","type":"rate_limit_error","code":"rate_limit_exceeded"}}"#;
        assert_eq!(
            format_api_error(body),
            "Rate limit exceeded (code: rate_limit_exceeded)"
        );
    }

    #[test]
    fn test_format_gemini_error_array() {
        let body = r#"[{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}]"#;
        assert_eq!(
            format_api_error(body),
            "API key not valid. (status: INVALID_ARGUMENT)"
        );
    }

    #[test]
    fn test_format_simple_error() {
        assert_eq!(format_api_error(r#"{"error":"Invalid API key"}"#), "Invalid API key");
    }

    #[test]
    fn test_format_top_level_message() {
        assert_eq!(
            format_api_error(r#"{"message":"Something went wrong"}"#),
            "Something went wrong"
        );
    }

    #[test]
    fn test_format_plain_text() {
        assert_eq!(format_api_error("  Connection refused\n"), "Connection refused");
    }

    #[test]
    fn test_format_unparseable_json() {
        assert_eq!(format_api_error("upstream: {invalid json}"), "upstream: {invalid json}");
    }

    #[test]
    fn test_status() {
        let err = Error::Api {
            status: 401,
            message: "nope".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(Error::Stream("eof".into()).status(), None);
        assert_eq!(err.to_string(), "HTTP 401: nope");
    }
}
