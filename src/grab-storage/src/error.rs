//! Error types for grab-storage.

use std::path::PathBuf;

use grab_core::BridgeError;
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store file exists but is not a list of instances.
    #[error("Corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Home directory not found.
    #[error("Could not determine home/data directory")]
    HomeDirNotFound,
}

impl From<StorageError> for BridgeError {
    fn from(err: StorageError) -> Self {
        BridgeError::Store(err.to_string())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
