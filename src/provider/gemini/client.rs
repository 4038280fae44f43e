//! Gemini API client.
//!
//! Talks to `generativelanguage.googleapis.com` with an API key. Streaming uses
//! `streamGenerateContent?alt=sse`, which yields whole `GenerateContentResponse`
//! objects as SSE events.

use super::types::{GeminiRequest, GeminiResponse};
use crate::provider::client::{ChatBackend, NativeStream};
use crate::provider::error::Error;
use crate::provider::http::{AuthConfig, HttpClient, decode_sse_stream};
use crate::provider::types::{ChatMessage, CompletionParams, NativeResponse};
use async_trait::async_trait;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const GEMINI_API_VERSION: &str = "v1beta";

/// Normalize model name (strip any `models/` prefix).
fn normalize_model_name(model: &str) -> &str {
    let trimmed = model.trim();
    trimmed.strip_prefix("models/").unwrap_or(trimmed)
}

/// The model name becomes a URL path segment, so it may only hold
/// `[A-Za-z0-9._-]` and never `..`.
fn validate_model_name(model: &str) -> Result<&str, Error> {
    let name = normalize_model_name(model);
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if name.is_empty() || name.contains("..") || !name.chars().all(allowed) {
        return Err(Error::InvalidRequest(format!("invalid model name `{model}`")));
    }
    Ok(name)
}

/// Gemini API-key client.
pub struct GeminiClient {
    http: HttpClient,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_endpoint(GEMINI_ENDPOINT, api_key, model)
    }

    /// Client against a non-default endpoint (proxies, local mocks).
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let auth = AuthConfig::ApiKey {
            header: "x-goog-api-key".to_string(),
            key: api_key.into(),
        };
        Self {
            http: HttpClient::new(endpoint, auth),
            model: model.into(),
        }
    }

    fn method_path(&self, params: &CompletionParams, method: &str) -> Result<String, Error> {
        let model = params.model.as_deref().unwrap_or(&self.model);
        let model = validate_model_name(model)?;
        Ok(format!("/{GEMINI_API_VERSION}/models/{model}:{method}"))
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    fn id(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeStream, Error> {
        let request = GeminiRequest::from_messages(&messages, params);
        let path = self.method_path(params, "streamGenerateContent?alt=sse")?;

        tracing::debug!(path = %path, contents = request.contents.len(), "Gemini stream request");

        let body = self.http.post_stream(&path, &request).await?;
        Ok(decode_sse_stream(body))
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<NativeResponse, Error> {
        let request = GeminiRequest::from_messages(&messages, params);
        let path = self.method_path(params, "generateContent")?;

        tracing::debug!(path = %path, contents = request.contents.len(), "Gemini request");

        let response: GeminiResponse = self.http.post_json(&path, &request).await?;
        Ok(NativeResponse::Gemini(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::NativeUnit;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(normalize_model_name("models/gemini-2.0-flash"), "gemini-2.0-flash");
        assert_eq!(normalize_model_name(" gemini-pro "), "gemini-pro");
    }

    #[test]
    fn test_method_path_honors_override() {
        let client = GeminiClient::new("k", "gemini-2.0-flash");
        assert_eq!(
            client
                .method_path(&CompletionParams::default(), "generateContent")
                .unwrap(),
            "/v1beta/models/gemini-2.0-flash:generateContent"
        );
        let params = CompletionParams {
            model: Some("models/gemini-pro".into()),
            ..CompletionParams::default()
        };
        assert_eq!(
            client.method_path(&params, "generateContent").unwrap(),
            "/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_validate_model_name() {
        for ok in ["gemini-2.0-flash", "models/gemini-1.5-pro-002", "gemini_exp"] {
            assert!(validate_model_name(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            "",
            "models/",
            "../files/secret#",
            "gemini..flash",
            "gemini/flash",
            "gemini?key=x",
            "gemini#frag",
            "gemini:streamGenerateContent",
            "gemini%2F..",
            "gemini flash",
        ] {
            assert!(
                matches!(validate_model_name(bad), Err(Error::InvalidRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_unsafe_model_override_never_reaches_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::with_endpoint(server.uri(), "g-key", "gemini-2.0-flash");
        let params = CompletionParams {
            model: Some("../files/secret#".into()),
            ..CompletionParams::default()
        };

        let err = client
            .complete(vec![ChatMessage::user("Hi")], &params)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(
            client
                .stream(vec![ChatMessage::user("Hi")], &params)
                .await
                .is_err()
        );

        let received = server.received_requests().await.unwrap();
        assert!(received.is_empty(), "upstream was called: {received:?}");
    }

    #[tokio::test]
    async fn test_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Paris"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 1, "totalTokenCount": 6}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_endpoint(server.uri(), "g-key", "gemini-2.0-flash");
        let response = client
            .complete(vec![ChatMessage::user("Capital of France?")], &CompletionParams::default())
            .await
            .unwrap();

        match response {
            NativeResponse::Gemini(r) => {
                assert_eq!(r.text(), "Paris");
                assert_eq!(r.finish_reason(), Some("STOP"));
                assert_eq!(r.usage_metadata.and_then(|u| u.total_token_count), Some(6));
            }
            NativeResponse::Chat(_) => panic!("expected a Gemini response"),
        }
    }

    #[tokio::test]
    async fn test_stream() {
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Pa\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"ris\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_endpoint(server.uri(), "g-key", "gemini-2.0-flash");
        let units: Vec<_> = client
            .stream(vec![ChatMessage::user("Hi")], &CompletionParams::default())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(units.len(), 2);
        match &units[1] {
            Ok(NativeUnit::Gemini(r)) => {
                assert_eq!(r.first_text(), Some("ris"));
                assert_eq!(r.finish_reason(), Some("STOP"));
            }
            other => panic!("unexpected unit: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_request_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            }])))
            .mount(&server)
            .await;

        let client = GeminiClient::with_endpoint(server.uri(), "bad", "gemini-2.0-flash");
        let err = client
            .complete(vec![ChatMessage::user("Hi")], &CompletionParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("API key not valid"));
    }
}
