//! Error types for the server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grab_core::BridgeError;
use grab_mediawiki::WikiError;
use grab_slack::SlackError;
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request signature missing or wrong.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource gone (expired).
    #[error("Gone: {0}")]
    Gone(String),

    /// Payload too large.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Slack or the wiki failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Feature not configured.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_failed",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Gone(_) => "gone",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Upstream(_) => "upstream_error",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for the server.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<SlackError> for AppError {
    fn from(error: SlackError) -> Self {
        match error {
            SlackError::SignatureVerification(reason) => Self::Authentication(reason),
            SlackError::InvalidPayload(reason) | SlackError::Json(reason) => Self::BadRequest(reason),
            SlackError::Config(reason) => Self::Unavailable(reason),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<WikiError> for AppError {
    fn from(error: WikiError) -> Self {
        match error {
            WikiError::Config(reason) => Self::BadRequest(reason),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<BridgeError> for AppError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::TenantNotFound(org) => Self::NotFound(format!("installation for {org}")),
            BridgeError::InvalidCorrelation(reason) => Self::BadRequest(reason),
            BridgeError::Store(reason) => Self::Internal(reason),
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Authentication("bad".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Gone("state".into()).status_code(), StatusCode::GONE);
        assert_eq!(AppError::PayloadTooLarge.error_code(), "payload_too_large");
    }

    #[test]
    fn test_conversions() {
        let err: AppError = SlackError::SignatureVerification("signature mismatch".into()).into();
        assert!(matches!(err, AppError::Authentication(_)));

        let err: AppError = BridgeError::TenantNotFound("T1".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: AppError = WikiError::Auth("WrongPass".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = AppError::BadRequest("missing payload field".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "bad_request");
        assert_eq!(json["error"]["message"], "Bad request: missing payload field");
    }
}
