//! Events API payloads.
//!
//! Handles the envelope types delivered to the events endpoint:
//! - `url_verification` - Endpoint ownership challenge
//! - `event_callback` - Wraps one inner event
//! - `app_rate_limited` - Slack is dropping events for the app
//!
//! Inner events used by Grab:
//! - `app_mention` - Somebody asked for a transcript from inside a thread
//! - `app_uninstalled` / `tokens_revoked` - The tenant record must go

use serde::{Deserialize, Serialize};

/// Private notice for a mention outside any thread.
pub const NOT_IN_THREAD_NOTICE: &str = "Sorry, I only work inside threads!";

/// Outer Events API envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Challenge sent when the request URL is configured.
    UrlVerification {
        /// Value to echo back.
        challenge: String,
    },
    /// A subscribed event.
    EventCallback(EventCallback),
    /// Events are being dropped for this app.
    AppRateLimited {
        /// Minute-long window that was rate limited.
        #[serde(default)]
        minute_rate_limited: Option<u64>,
    },
    /// Unknown envelope type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// `event_callback` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCallback {
    /// Workspace the event came from.
    pub team_id: String,
    /// Enterprise grid org, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<String>,
    /// Event ID, for log correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// The inner event.
    pub event: InnerEvent,
}

/// Inner event types that we handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerEvent {
    /// The bot was mentioned.
    AppMention(AppMentionEvent),
    /// The app was removed from the workspace.
    AppUninstalled {},
    /// Tokens issued to the app were revoked.
    TokensRevoked {
        /// Revoked tokens by kind.
        #[serde(default)]
        tokens: RevokedTokens,
    },
    /// Unknown event type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// User IDs whose tokens were revoked, by token kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevokedTokens {
    #[serde(default)]
    pub oauth: Vec<String>,
    #[serde(default)]
    pub bot: Vec<String>,
}

impl InnerEvent {
    /// Whether this event means the workspace's bot can no longer act.
    pub fn ends_installation(&self) -> bool {
        match self {
            Self::AppUninstalled {} => true,
            Self::TokensRevoked { tokens } => !tokens.bot.is_empty(),
            _ => false,
        }
    }
}

/// Event payload for app mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMentionEvent {
    /// User who mentioned the bot.
    pub user: String,
    /// Text of the message (including the mention).
    pub text: String,
    /// Channel where the mention occurred.
    pub channel: String,
    /// Timestamp of the message.
    pub ts: String,
    /// Thread timestamp (if in a thread).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Team of the mentioning user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl AppMentionEvent {
    /// Root of the thread the mention was posted in. `None` for top-level
    /// channel messages, including a thread root mentioning the bot itself.
    pub fn thread_root(&self) -> Option<&str> {
        self.thread_ts
            .as_deref()
            .filter(|thread_ts| *thread_ts != self.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_verification() {
        let envelope: EventEnvelope = serde_json::from_str(
            r#"{"token": "x", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P", "type": "url_verification"}"#,
        )
        .unwrap();
        match envelope {
            EventEnvelope::UrlVerification { challenge } => {
                assert!(challenge.starts_with("3eZbrw"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_app_mention_in_thread() {
        let envelope: EventEnvelope = serde_json::from_value(serde_json::json!({
            "type": "event_callback",
            "team_id": "T1",
            "api_app_id": "A1",
            "event_id": "Ev1",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> grab this",
                "ts": "1700000050.000200",
                "channel": "C1",
                "thread_ts": "1700000000.000100",
                "event_ts": "1700000050.000200"
            }
        }))
        .unwrap();

        let EventEnvelope::EventCallback(callback) = envelope else {
            panic!("expected event callback");
        };
        assert_eq!(callback.team_id, "T1");
        let InnerEvent::AppMention(mention) = callback.event else {
            panic!("expected app mention");
        };
        assert_eq!(mention.thread_root(), Some("1700000000.000100"));
    }

    #[test]
    fn test_mention_outside_thread() {
        let mention = AppMentionEvent {
            user: "U1".into(),
            text: "<@UBOT>".into(),
            channel: "C1".into(),
            ts: "5.0".into(),
            thread_ts: None,
            team: None,
        };
        assert_eq!(mention.thread_root(), None);

        let root = AppMentionEvent {
            thread_ts: Some("5.0".into()),
            ..mention
        };
        assert_eq!(root.thread_root(), None);
    }

    #[test]
    fn test_uninstall_events() {
        let event: InnerEvent =
            serde_json::from_str(r#"{"type": "app_uninstalled", "event_ts": "1.0"}"#).unwrap();
        assert!(event.ends_installation());

        let event: InnerEvent = serde_json::from_str(
            r#"{"type": "tokens_revoked", "tokens": {"oauth": ["U1"], "bot": []}}"#,
        )
        .unwrap();
        assert!(!event.ends_installation());

        let event: InnerEvent = serde_json::from_str(
            r#"{"type": "tokens_revoked", "tokens": {"bot": ["UBOT"]}}"#,
        )
        .unwrap();
        assert!(event.ends_installation());
    }

    #[test]
    fn test_unknown_types() {
        let event: InnerEvent =
            serde_json::from_str(r#"{"type": "reaction_added", "user": "U1"}"#).unwrap();
        assert!(matches!(event, InnerEvent::Unknown));

        let envelope: EventEnvelope = serde_json::from_str(r#"{"type": "something_new"}"#).unwrap();
        assert!(matches!(envelope, EventEnvelope::Unknown));
    }
}
