//! Error taxonomy for a publish run.
//!
//! Every failure that can end a publish maps onto one of these variants, and
//! every variant knows how to describe itself to the person who asked for the
//! transcript. Nothing here is retried automatically; the user re-triggers.

use thiserror::Error;

/// Errors that can terminate a publish run.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Reading the conversation from the chat platform failed.
    ///
    /// Raised before any destination write, so retrying is always safe.
    #[error("Could not read the conversation: {0}")]
    SourceFetch(String),

    /// Every message was filtered out as bot noise.
    #[error("Thread has no messages left after filtering")]
    EmptyThread,

    /// The wiki refused the configured credentials.
    #[error("Wiki authentication failed: {0}")]
    DestinationAuth(String),

    /// A wiki edit or upload failed after the existence checks passed.
    ///
    /// Partial writes (a deleted section that was never recreated) are not
    /// rolled back.
    #[error("Wiki write failed: {0}")]
    DestinationWrite(String),

    /// A downloaded attachment could not be read or written locally.
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// Correlation state carried by a form could not be decoded.
    #[error("Invalid correlation state: {0}")]
    InvalidCorrelation(String),

    /// No installation exists for the chat organization.
    #[error("No installation found for {0}")]
    TenantNotFound(String),

    /// Delivering a notice back to the chat surface failed.
    #[error("Notification failed: {0}")]
    Notify(String),

    /// The credential store failed.
    #[error("Credential store error: {0}")]
    Store(String),
}

impl BridgeError {
    /// Text shown to the user in the private failure notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::SourceFetch(detail) => {
                format!("Sorry, I could not read the conversation ({detail}). Nothing was written to the wiki, so it is safe to try again.")
            }
            Self::EmptyThread => "There is nothing to save: every message in this thread was sent by me or mentions me.".to_string(),
            Self::DestinationAuth(_) => "I could not log into the wiki. Please reinstall Grab with valid wiki credentials.".to_string(),
            Self::DestinationWrite(detail) => {
                format!("The wiki rejected the edit ({detail}). The article may be partially updated; please check it before retrying.")
            }
            Self::Attachment(detail) => format!("An attachment could not be processed ({detail})."),
            Self::InvalidCorrelation(_) => {
                "That form has expired or was damaged. Please start again from the message menu.".to_string()
            }
            Self::TenantNotFound(_) => "Grab is not installed for this workspace.".to_string(),
            Self::Notify(detail) | Self::Store(detail) => format!("Something went wrong on my side ({detail})."),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Attachment(err.to_string())
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::SourceFetch("channel_not_found".to_string());
        assert_eq!(
            err.to_string(),
            "Could not read the conversation: channel_not_found"
        );
        assert_eq!(
            BridgeError::EmptyThread.to_string(),
            "Thread has no messages left after filtering"
        );
    }

    #[test]
    fn test_user_messages() {
        assert!(
            BridgeError::SourceFetch("timeout".into())
                .user_message()
                .contains("safe to try again")
        );
        assert!(
            BridgeError::DestinationAuth("WrongPass".into())
                .user_message()
                .contains("reinstall")
        );
        // The raw login failure reason must not leak into chat.
        assert!(
            !BridgeError::DestinationAuth("WrongPass".into())
                .user_message()
                .contains("WrongPass")
        );
    }
}
