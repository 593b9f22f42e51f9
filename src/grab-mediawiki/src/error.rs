//! Error types for the MediaWiki side of Grab.

use grab_core::BridgeError;
use thiserror::Error;

/// Errors that can occur while talking to a wiki.
#[derive(Error, Debug)]
pub enum WikiError {
    /// Configuration error (bad URL, missing credentials).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login failed or the session lacks rights.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The Action API returned an error object.
    #[error("MediaWiki API error {code}: {info}")]
    Api {
        /// Error code, e.g. `protectedpage`.
        code: String,
        /// Human-readable description.
        info: String,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Local file could not be read for upload.
    #[error("File error: {0}")]
    File(String),

    /// The API answered with something we do not understand.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl WikiError {
    /// Build an API error, classifying permission problems as `Auth`.
    pub fn api(code: impl Into<String>, info: impl Into<String>) -> Self {
        let code = code.into();
        let info = info.into();
        match code.as_str() {
            "notloggedin" | "readapidenied" | "assertuserfailed" | "assertbotfailed"
            | "permissiondenied" | "badtoken" => WikiError::Auth(format!("{code}: {info}")),
            _ => WikiError::Api { code, info },
        }
    }

    /// Map onto the publish error taxonomy.
    pub fn into_bridge_error(self) -> BridgeError {
        match self {
            WikiError::Auth(reason) => BridgeError::DestinationAuth(reason),
            WikiError::File(reason) => BridgeError::Attachment(reason),
            other => BridgeError::DestinationWrite(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for WikiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WikiError::Timeout(err.to_string())
        } else if err.is_connect() {
            WikiError::Network(format!("Connection failed: {}", err))
        } else {
            WikiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WikiError {
    fn from(err: serde_json::Error) -> Self {
        WikiError::Json(err.to_string())
    }
}

impl From<std::io::Error> for WikiError {
    fn from(err: std::io::Error) -> Self {
        WikiError::File(err.to_string())
    }
}

/// Result type for wiki operations.
pub type WikiResult<T> = std::result::Result<T, WikiError>;
