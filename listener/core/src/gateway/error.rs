//! Gateway error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::backend::ProviderError;

/// Non-streaming failure answered as `{"error":{"code","message"}}`
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// Create an error with an explicit status
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 504 Gateway Timeout
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        let status = match &err {
            ProviderError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ProviderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProviderError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProviderError::Authentication(_)
            | ProviderError::UnknownModel(_)
            | ProviderError::Network(_)
            | ProviderError::Upstream { .. }
            | ProviderError::Stream(_)
            | ProviderError::Configuration(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!(error = %err, status = status.as_u16(), "Provider call failed");
        Self::new(status, err.to_string())
    }
}
