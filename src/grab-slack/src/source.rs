//! `ChatSource` implementation backed by the Slack Web API.
//!
//! A fetch runs in four steps: read the raw messages (following pagination),
//! drop bot noise, resolve authors through a cache that lives for that one
//! fetch, and download attachments into private temp files.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use grab_core::{
    Attachment, AttachmentKind, BridgeError, BridgeResult, ChatSource, FormSurface, Message,
    PrivateNotice, PublishForm, Thread,
};
use tracing::{debug, info, warn};

use crate::blocks::{ephemeral_prompt, publish_modal};
use crate::client::{AuthTestResponse, DelayedResponse, RawMessage, SlackClient};
use crate::error::SlackError;
use crate::mrkdwn::mrkdwn_to_markdown;

/// Fallback text of the ephemeral form, for clients without Block Kit.
const PROMPT_TEXT: &str = "Save this thread to the wiki?";

/// Who the bot is in one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub bot_id: Option<String>,
}

impl From<AuthTestResponse> for BotIdentity {
    fn from(response: AuthTestResponse) -> Self {
        Self {
            user_id: response.user_id,
            bot_id: response.bot_id,
        }
    }
}

impl BotIdentity {
    /// Whether a message is the bot's own output or a command addressed to
    /// it. Either way it is not conversation content.
    pub fn is_noise(&self, message: &RawMessage) -> bool {
        if message.user.as_deref() == Some(self.user_id.as_str()) {
            return true;
        }
        if self.bot_id.is_some() && message.bot_id == self.bot_id {
            return true;
        }
        message.text.contains(&format!("<@{}>", self.user_id))
    }
}

/// Parse a Slack `ts` (`"1700000000.000100"`) into a UTC instant.
pub fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{:0<6}", frac).get(..6)?.parse().ok()?;
    Utc.timestamp_opt(secs, micros * 1_000).single()
}

/// User ID to display name, scoped to one fetch.
struct NameCache<'a> {
    client: &'a SlackClient,
    names: HashMap<String, String>,
}

impl<'a> NameCache<'a> {
    fn new(client: &'a SlackClient) -> Self {
        Self {
            client,
            names: HashMap::new(),
        }
    }

    async fn resolve(&mut self, user_id: &str) -> String {
        if let Some(name) = self.names.get(user_id) {
            return name.clone();
        }
        let name = match self.client.user_display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(user = %user_id, error = %e, "Could not resolve user, using raw ID");
                user_id.to_string()
            }
        };
        self.names.insert(user_id.to_string(), name.clone());
        name
    }

    fn len(&self) -> usize {
        self.names.len()
    }
}

/// Slack side of a publish run, bound to one workspace token.
#[derive(Debug, Clone)]
pub struct SlackSource {
    client: SlackClient,
}

impl SlackSource {
    pub fn new(client: SlackClient) -> Self {
        Self { client }
    }

    /// The underlying Web API client.
    pub fn client(&self) -> &SlackClient {
        &self.client
    }

    async fn identity(&self) -> BridgeResult<BotIdentity> {
        self.client
            .auth_test()
            .await
            .map(BotIdentity::from)
            .map_err(SlackError::into_source_error)
    }

    /// Turn raw messages (oldest first) into neutral messages.
    async fn convert(&self, raw: Vec<RawMessage>) -> BridgeResult<Vec<Message>> {
        let identity = self.identity().await?;
        let mut names = NameCache::new(&self.client);
        let total = raw.len();
        let mut messages = Vec::with_capacity(total);

        for message in raw.into_iter().filter(|m| !identity.is_noise(m)) {
            let Some(timestamp) = parse_ts(&message.ts) else {
                warn!(ts = %message.ts, "Skipping message with unparseable timestamp");
                continue;
            };

            let author = match (&message.user, &message.bot_id) {
                (Some(user), _) => names.resolve(user).await,
                (None, Some(bot_id)) => bot_id.clone(),
                (None, None) => "unknown".to_string(),
            };

            let mut converted = Message::new(timestamp, author, message_text(&message));
            for file in &message.files {
                if AttachmentKind::from_mimetype(&file.mimetype) == AttachmentKind::Unsupported {
                    debug!(file = %file.id, mimetype = %file.mimetype, "Not downloading unsupported file");
                    continue;
                }
                let temp = self
                    .client
                    .download_file(file)
                    .await
                    .map_err(SlackError::into_source_error)?;
                converted = converted.with_file(Attachment::new(&file.name, &file.mimetype, temp));
            }
            messages.push(converted);
        }

        debug!(
            total,
            kept = messages.len(),
            authors = names.len(),
            "Converted raw messages"
        );
        Ok(messages)
    }
}

/// Message body in neutral markup, with legacy attachments appended as
/// fenced blocks.
fn message_text(message: &RawMessage) -> String {
    let mut text = mrkdwn_to_markdown(&message.text);
    for attachment in &message.attachments {
        if let Some(body) = attachment.text.as_ref().or(attachment.fallback.as_ref()) {
            text.push_str("\n\n```");
            text.push_str(body);
            text.push_str("```");
        }
    }
    text
}

#[async_trait]
impl ChatSource for SlackSource {
    async fn fetch_by_thread_reference(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> BridgeResult<Thread> {
        let raw = self
            .client
            .conversation_replies(channel_id, thread_ts)
            .await
            .map_err(SlackError::into_source_error)?;
        if raw.is_empty() {
            return Err(BridgeError::SourceFetch(format!(
                "no messages found in thread {thread_ts}"
            )));
        }
        info!(channel = %channel_id, thread = %thread_ts, raw = raw.len(), "Fetched thread replies");

        let started = parse_ts(thread_ts).or_else(|| raw.first().and_then(|m| parse_ts(&m.ts)));
        let messages = self.convert(raw).await?;
        match started {
            Some(timestamp) => Thread::new(timestamp, messages),
            None => Thread::from_messages(messages),
        }
    }

    async fn fetch_by_range(
        &self,
        channel_id: &str,
        oldest: &str,
        latest: &str,
    ) -> BridgeResult<Thread> {
        let mut raw = self
            .client
            .conversation_history(channel_id, oldest, latest)
            .await
            .map_err(SlackError::into_source_error)?;
        if raw.is_empty() {
            return Err(BridgeError::SourceFetch(format!(
                "no messages found between {oldest} and {latest}"
            )));
        }
        info!(channel = %channel_id, oldest = %oldest, latest = %latest, raw = raw.len(), "Fetched channel range");

        // History comes back newest first.
        raw.reverse();
        Thread::from_messages(self.convert(raw).await?)
    }

    async fn open_form(&self, surface: &FormSurface, form: &PublishForm) -> BridgeResult<()> {
        match surface {
            FormSurface::Modal { trigger_id } => {
                let view = serde_json::to_value(publish_modal(form))
                    .map_err(|e| BridgeError::Notify(e.to_string()))?;
                self.client
                    .views_open(trigger_id, view)
                    .await
                    .map_err(SlackError::into_notify_error)
            }
            FormSurface::Ephemeral => {
                let correlation = &form.correlation;
                let blocks = serde_json::to_value(ephemeral_prompt(form))
                    .map_err(|e| BridgeError::Notify(e.to_string()))?;
                self.client
                    .post_ephemeral(
                        &correlation.channel_id,
                        &correlation.user_id,
                        Some(correlation.reference.anchor_ts()),
                        PROMPT_TEXT,
                        Some(blocks),
                    )
                    .await
                    .map_err(SlackError::into_notify_error)
            }
        }
    }

    async fn post_private_notice(&self, notice: &PrivateNotice) -> BridgeResult<()> {
        let result = match &notice.response_url {
            Some(response_url) => {
                let body = DelayedResponse::new()
                    .with_text(&notice.text)
                    .in_thread(notice.thread_ts.clone())
                    .replace_original();
                self.client.respond(response_url, &body).await
            }
            None => {
                self.client
                    .post_ephemeral(
                        &notice.channel_id,
                        &notice.user_id,
                        notice.thread_ts.as_deref(),
                        &notice.text,
                        None,
                    )
                    .await
            }
        };
        result.map_err(SlackError::into_notify_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn raw(user: Option<&str>, bot_id: Option<&str>, text: &str) -> RawMessage {
        RawMessage {
            ts: "1.0".into(),
            user: user.map(str::to_string),
            bot_id: bot_id.map(str::to_string),
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_noise_detection() {
        let bot = BotIdentity {
            user_id: "UBOT".into(),
            bot_id: Some("BBOT".into()),
        };
        assert!(bot.is_noise(&raw(Some("UBOT"), None, "Article saved!")));
        assert!(bot.is_noise(&raw(None, Some("BBOT"), "Article saved!")));
        assert!(bot.is_noise(&raw(Some("U1"), None, "<@UBOT> grab this")));
        assert!(!bot.is_noise(&raw(Some("U1"), None, "hello <@U2>")));
        assert!(!bot.is_noise(&raw(None, Some("BOTHER"), "deploy finished")));
    }

    #[test]
    fn test_noise_without_bot_id() {
        let bot = BotIdentity {
            user_id: "UBOT".into(),
            bot_id: None,
        };
        assert!(!bot.is_noise(&raw(None, None, "system message")));
    }

    #[test]
    fn test_parse_ts() {
        let ts = parse_ts("1700000000.000100").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_micros(), 100);
        assert_eq!(ts.year(), 2023);
        assert_eq!(ts.hour(), 22);

        assert_eq!(parse_ts("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert!(parse_ts("not-a-ts").is_none());
    }

    #[test]
    fn test_legacy_attachments_fenced() {
        let mut message = raw(Some("U1"), None, "*look*");
        message.attachments = vec![
            crate::client::RawAttachment {
                text: Some("build #12 passed".into()),
                fallback: None,
            },
            crate::client::RawAttachment {
                text: None,
                fallback: None,
            },
        ];
        assert_eq!(message_text(&message), "**look**\n\n```build #12 passed```");
    }
}
