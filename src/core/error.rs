//! Error types for the LLM gateway.
//!
//! Defines the gateway-wide failure taxonomy and its mapping onto
//! OpenAI-shaped JSON error bodies. Every failure kind carries a fixed
//! HTTP status and body shape; raw upstream error text never reaches the
//! client, only classified human-readable messages do.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error type for the 503 body shape.
const ERROR_TYPE_UNAVAILABLE: &str = "service_unavailable";

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Request failed structural validation; no provider was contacted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider segment of a composite model id is not registered.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A provider could not be reached or instantiated.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider call itself failed or returned malformed data.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything that should never happen in normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classify an upstream HTTP client error without leaking its debug text.
///
/// Connection-phase failures mean the provider endpoint itself is
/// unreachable; everything after the connection is an upstream failure.
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            GatewayError::ProviderUnavailable(
                "failed to connect to upstream provider".to_string(),
            )
        } else if err.is_timeout() {
            GatewayError::ProviderUnavailable("upstream provider timed out".to_string())
        } else if err.is_decode() {
            GatewayError::Upstream("upstream returned a malformed response body".to_string())
        } else {
            GatewayError::Upstream("upstream request failed".to_string())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidRequest(_) | GatewayError::UnknownProvider(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_)
            | GatewayError::Serialization(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            GatewayError::InvalidRequest(_) | GatewayError::UnknownProvider(_) => {
                json!({ "error": self.to_string() })
            }
            GatewayError::ProviderUnavailable(_) => json!({
                "error": {
                    "message": self.to_string(),
                    "type": ERROR_TYPE_UNAVAILABLE,
                    "code": status.as_u16(),
                }
            }),
            GatewayError::Upstream(msg) => json!({
                "error": "upstream_failure",
                "message": msg,
            }),
            GatewayError::Serialization(_) | GatewayError::Internal(_) => json!({
                "error": "internal_error",
                "message": "An internal error occurred",
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, GatewayError>;
