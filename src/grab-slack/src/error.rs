//! Error types for the Slack side of Grab.
//!
//! Covers network failures, Web API error codes, malformed payloads and
//! request signature failures.

use grab_core::BridgeError;
use thiserror::Error;

/// Errors that can occur during Slack operations.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (invalid, revoked or inactive token).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API request failed.
    #[error("Slack API error: {0}")]
    Api(String),

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Request signature verification failed.
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel not found or bot not in channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Thread or message not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User not found.
    #[error("User error: {0}")]
    User(String),

    /// Invalid payload received from Slack.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Local file error while handling a download.
    #[error("File error: {0}")]
    File(String),
}

impl SlackError {
    /// Map a failure while reading a conversation.
    pub fn into_source_error(self) -> BridgeError {
        BridgeError::SourceFetch(self.to_string())
    }

    /// Map a failure while talking back to the user.
    pub fn into_notify_error(self) -> BridgeError {
        BridgeError::Notify(self.to_string())
    }
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<std::io::Error> for SlackError {
    fn from(err: std::io::Error) -> Self {
        SlackError::File(err.to_string())
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Represents a Slack API response error.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "channel_not_found").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is retryable.
    pub retryable: bool,
}

impl SlackApiError {
    /// Create a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let retryable = Self::is_retryable_code(&code);
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    /// Check if an error code is retryable.
    fn is_retryable_code(code: &str) -> bool {
        matches!(
            code,
            "ratelimited"
                | "rate_limited"
                | "service_unavailable"
                | "internal_error"
                | "request_timeout"
                | "fatal_error"
        )
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        match err.code.as_str() {
            "ratelimited" | "rate_limited" => SlackError::RateLimited {
                retry_after_secs: 30,
            },
            "invalid_auth" | "account_inactive" | "token_revoked" | "not_authed" => {
                SlackError::Auth(err.message)
            }
            "channel_not_found" | "not_in_channel" => SlackError::Channel(err.message),
            "thread_not_found" | "message_not_found" => SlackError::NotFound(err.message),
            "user_not_found" => SlackError::User(err.message),
            _ => SlackError::Api(format!("{}: {}", err.code, err.message)),
        }
    }
}
