//! Stateless correlation between the form and its submission.
//!
//! The channel, thread and user that opened a form ride inside the form
//! itself, so nothing is kept server-side between the two HTTP calls. The
//! value is JSON, base64url-encoded, which keeps delimiter characters in
//! identifiers harmless.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Which messages make up the conversation to transcribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreadReference {
    /// All replies anchored to a root message.
    Thread {
        /// Root message timestamp.
        thread_ts: String,
    },
    /// Every message between two timestamps, both inclusive.
    Range {
        /// Earliest message timestamp.
        oldest: String,
        /// Latest message timestamp.
        latest: String,
    },
}

impl ThreadReference {
    /// Reference a thread by its root timestamp.
    pub fn thread(thread_ts: impl Into<String>) -> Self {
        Self::Thread {
            thread_ts: thread_ts.into(),
        }
    }

    /// Reference an inclusive range of messages.
    pub fn range(oldest: impl Into<String>, latest: impl Into<String>) -> Self {
        Self::Range {
            oldest: oldest.into(),
            latest: latest.into(),
        }
    }

    /// Timestamp that private notices should be threaded under.
    pub fn anchor_ts(&self) -> &str {
        match self {
            Self::Thread { thread_ts } => thread_ts,
            Self::Range { latest, .. } => latest,
        }
    }
}

/// Origin of a publish request, carried through the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Chat organization (tenant) identifier.
    pub team_id: String,
    /// Channel the conversation lives in.
    pub channel_id: String,
    /// User who asked for the transcript.
    pub user_id: String,
    /// Conversation to transcribe.
    pub reference: ThreadReference,
    /// Reply URL of an ephemeral form, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

impl Correlation {
    /// Serialize into a compact, delimiter-free token.
    pub fn encode(&self) -> String {
        // Serializing plain strings and enums cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parse a token produced by `encode`.
    pub fn decode(token: &str) -> BridgeResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| BridgeError::InvalidCorrelation(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| BridgeError::InvalidCorrelation(e.to_string()))
    }
}
