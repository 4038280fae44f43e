//! HTTP client wrapper for upstream LLM API requests.

use crate::provider::error::{Error, format_api_error};
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Whole-request timeout; generous because streamed generations can be long.
const TIMEOUT: Duration = Duration::from_secs(300);
/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authentication configuration.
#[derive(Clone)]
pub enum AuthConfig {
    /// `Authorization: Bearer {token}`; an empty token sends no header.
    Bearer(String),
    /// Custom header authentication (e.g., `x-goog-api-key: {key}`).
    ApiKey { header: String, key: String },
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .field("key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// HTTP client bound to one upstream base URL and credential.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthConfig,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, auth: AuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build headers including authentication.
    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match &self.auth {
            AuthConfig::Bearer(token) if token.is_empty() => {}
            AuthConfig::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    Error::Config("Bearer token contains invalid header characters".into())
                })?;
                headers.insert(AUTHORIZATION, value);
            }
            AuthConfig::ApiKey { header, key } => {
                let name = HeaderName::try_from(header)
                    .map_err(|_| Error::Config("API key header name is invalid".into()))?;
                let value = HeaderValue::from_str(key).map_err(|_| {
                    Error::Config("API key contains invalid header characters".into())
                })?;
                headers.insert(name, value);
            }
        }

        Ok(headers)
    }

    /// POST a JSON body and deserialize the JSON response.
    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, Error> {
        let url = format!("{}{path}", self.base_url);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: format_api_error(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::Parse(format!("{e}; body: {text}")))
    }

    /// POST a JSON body and return the raw response byte stream.
    ///
    /// Sets `Accept: text/event-stream`. A non-success status is reported here,
    /// before any byte of the body is handed out.
    pub async fn post_stream<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static, Error> {
        let url = format!("{}{path}", self.base_url);
        let mut headers = self.build_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: format_api_error(&text),
            });
        }

        Ok(response.bytes_stream())
    }
}
