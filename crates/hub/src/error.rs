use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use bridge::broker::BrokerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Convenience type alias
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    /// Map to an HTTP status + JSON body with a structured error code.
    /// Internal errors are sanitized to avoid leaking backend details.
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string())
            }
            ApiError::Unavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", self.to_string())
            }
            ApiError::Broker(ref err) => {
                // Log broker details server-side but sanitize for client
                tracing::error!("Broker error: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    "BROKER_ERROR",
                    "A backend communication error occurred".to_string(),
                )
            }
            ApiError::Internal(ref detail) => {
                // Log the full detail server-side but don't expose to client
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = ApiError::InvalidRequest("bad ip".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_broker_error_is_sanitized() {
        let err = ApiError::Broker(BrokerError::Publish("nats://secret-host:4222 refused".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
