//! Request-level errors and their HTTP status mapping.

use crate::provider::{self, UnknownBackend};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
    #[error("No route for {0}")]
    RouteNotFound(String),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Upstream unavailable: {message}")]
    Upstream { status: Option<u16>, message: String },
}

impl GatewayError {
    /// HTTP status for the error response.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownBackend(_) | Self::MalformedRequest(_) => 400,
            Self::RouteNotFound(_) => 404,
            Self::Upstream { status, .. } => status
                .filter(|s| (400..=599).contains(s))
                .unwrap_or(500),
        }
    }

    /// `type` field of the error body.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownBackend(_) => "unknown_backend",
            Self::RouteNotFound(_) => "not_found",
            Self::MalformedRequest(_) => "invalid_request_error",
            Self::Upstream { .. } => "upstream_error",
        }
    }

    /// `{"error": {"message", "type", "code"}}`.
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
                "code": self.status_code(),
            }
        })
    }
}

impl From<UnknownBackend> for GatewayError {
    fn from(err: UnknownBackend) -> Self {
        Self::UnknownBackend(err.0)
    }
}

impl From<provider::Error> for GatewayError {
    fn from(err: provider::Error) -> Self {
        if let provider::Error::InvalidRequest(message) = err {
            return Self::MalformedRequest(message);
        }
        let status = err.status();
        let message = match err {
            provider::Error::Api { message, .. } => message,
            other => other.to_string(),
        };
        Self::Upstream { status, message }
    }
}
