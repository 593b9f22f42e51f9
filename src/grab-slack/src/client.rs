//! Slack Web API client.
//!
//! One `SlackClient` is built per tenant from the workspace bot token; there
//! is no process-wide client. Reads use GET with query parameters, writes
//! use JSON POST bodies, and every `{"ok": false}` response is mapped
//! through `SlackApiError`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use crate::error::{SlackApiError, SlackError, SlackResult};

/// Production Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Page size requested from paginated conversation methods.
const PAGE_LIMIT: &str = "200";

/// Identity of the bot behind a token, from `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestResponse {
    /// Bot user ID.
    pub user_id: String,
    /// Bot ID, if the token belongs to a bot user.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Workspace the token belongs to.
    #[serde(default)]
    pub team_id: Option<String>,
}

/// A conversation message as returned by the history APIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<RawFile>,
    /// Legacy attachments such as link unfurls and bot cards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<RawAttachment>,
}

/// A file shared in a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub filetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private_download: Option<String>,
}

impl RawFile {
    /// Extension to keep on the local temp copy.
    pub fn extension(&self) -> Option<&str> {
        let from_name = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty());
        from_name.or_else(|| (!self.filetype.is_empty()).then_some(self.filetype.as_str()))
    }
}

/// A legacy message attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationPage {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    real_name: String,
}

/// Body posted to an interaction's `response_url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayedResponse {
    /// Whether to replace the original message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    /// Whether to delete the original message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_original: Option<bool>,
    /// Thread to keep the reply in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Block Kit blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Value>,
}

impl DelayedResponse {
    /// Create a new delayed response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Keep the reply in a thread.
    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }

    /// Replace the original message.
    pub fn replace_original(mut self) -> Self {
        self.replace_original = Some(true);
        self
    }
}

/// Slack Web API client bound to one bot token.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SlackClient {
    /// Create a client for one workspace bot token.
    pub fn new(token: impl Into<String>) -> SlackResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SlackError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token: SecretString::from(token.into()),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Send Web API calls to a different base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Verify the token and return the bot's identity.
    pub async fn auth_test(&self) -> SlackResult<AuthTestResponse> {
        self.post("auth.test", &serde_json::json!({})).await
    }

    /// All replies in a thread, oldest first, across every page.
    pub async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> SlackResult<Vec<RawMessage>> {
        self.paginate(
            "conversations.replies",
            &[("channel", channel), ("ts", thread_ts)],
        )
        .await
    }

    /// All channel messages between two timestamps, both inclusive, in the
    /// order Slack returns them (newest first).
    pub async fn conversation_history(
        &self,
        channel: &str,
        oldest: &str,
        latest: &str,
    ) -> SlackResult<Vec<RawMessage>> {
        self.paginate(
            "conversations.history",
            &[
                ("channel", channel),
                ("oldest", oldest),
                ("latest", latest),
                ("inclusive", "true"),
            ],
        )
        .await
    }

    async fn paginate(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> SlackResult<Vec<RawMessage>> {
        let mut messages = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query: Vec<(&str, &str)> = params.to_vec();
            query.push(("limit", PAGE_LIMIT));
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: ConversationPage = self.get(method, &query).await?;
            messages.extend(page.messages);

            let next = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if next.is_empty() {
                break;
            }
            debug!(method, "Following pagination cursor");
            cursor = next;
        }

        Ok(messages)
    }

    /// Best human-readable name for a user.
    pub async fn user_display_name(&self, user_id: &str) -> SlackResult<String> {
        let info: UserInfoResponse = self.get("users.info", &[("user", user_id)]).await?;
        let user = info.user;

        let name = [user.profile.display_name, user.profile.real_name, user.name]
            .into_iter()
            .find(|candidate| !candidate.trim().is_empty())
            .unwrap_or_else(|| user_id.to_string());
        Ok(name)
    }

    /// Download a shared file into a private temp file named
    /// `grab-<random>.<ext>`.
    pub async fn download_file(&self, file: &RawFile) -> SlackResult<NamedTempFile> {
        let url = file.url_private_download.as_deref().ok_or_else(|| {
            SlackError::InvalidPayload(format!("File {} has no download URL", file.id))
        })?;

        let response = self
            .http
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SlackError::Api(format!(
                "Download of {} failed with status {}",
                file.id, status
            )));
        }
        let bytes = response.bytes().await?;

        let suffix = file
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix("grab-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(temp.path(), &bytes).await?;

        debug!(file = %file.id, size = bytes.len(), path = %temp.path().display(), "Downloaded file");
        Ok(temp)
    }

    /// Post a message only `user` can see.
    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        thread_ts: Option<&str>,
        text: &str,
        blocks: Option<Value>,
    ) -> SlackResult<()> {
        let mut payload = serde_json::json!({
            "channel": channel,
            "user": user,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = serde_json::json!(thread_ts);
        }
        if let Some(blocks) = blocks {
            payload["blocks"] = blocks;
        }

        let _: Value = self.post("chat.postEphemeral", &payload).await?;
        Ok(())
    }

    /// Open a modal view.
    pub async fn views_open(&self, trigger_id: &str, view: Value) -> SlackResult<()> {
        let payload = serde_json::json!({
            "trigger_id": trigger_id,
            "view": view,
        });
        let _: Value = self.post("views.open", &payload).await?;
        Ok(())
    }

    /// Send a delayed response to an interaction's `response_url`.
    pub async fn respond(&self, response_url: &str, response: &DelayedResponse) -> SlackResult<()> {
        debug!("Sending delayed response to: {}", response_url);

        let resp = self.http.post(response_url).json(response).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Failed to send delayed response: {} - {}", status, body);
            return Err(SlackError::Api(format!(
                "Failed to send delayed response: {} - {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> SlackResult<T> {
        debug!(method, "Slack API GET");
        let response = self
            .http
            .get(self.method_url(method))
            .header("Authorization", self.bearer())
            .query(query)
            .send()
            .await?;
        Self::decode(method, response).await
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> SlackResult<T> {
        debug!(method, "Slack API POST");
        let response = self
            .http
            .post(self.method_url(method))
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> SlackResult<T> {
        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{}: {}: {}", method, status, body)));
        }

        let json: Value = response.json().await?;
        if json.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let code = json
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            return Err(SlackApiError::new(code, format!("{method}: {code}")).into());
        }

        Ok(serde_json::from_value(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::new("xoxb-test")
            .unwrap()
            .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_auth_test() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .and(header("Authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "user_id": "UBOT", "bot_id": "BBOT", "team_id": "T1"
            })))
            .mount(&server)
            .await;

        let identity = client_for(&server).await.auth_test().await.unwrap();
        assert_eq!(identity.user_id, "UBOT");
        assert_eq!(identity.bot_id.as_deref(), Some("BBOT"));
    }

    #[tokio::test]
    async fn test_replies_follow_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.replies"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "messages": [{"ts": "3.0", "user": "U1", "text": "third"}],
                "response_metadata": {"next_cursor": ""}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.replies"))
            .and(query_param("ts", "1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "messages": [
                    {"ts": "1.0", "user": "U1", "text": "first"},
                    {"ts": "2.0", "user": "U2", "text": "second"}
                ],
                "has_more": true,
                "response_metadata": {"next_cursor": "page2"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let messages = client_for(&server)
            .await
            .conversation_replies("C1", "1.0")
            .await
            .unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_api_error_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false, "error": "channel_not_found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .conversation_history("C404", "1.0", "2.0")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Channel(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .user_display_name("U1")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_display_name_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "user": {"name": "alice.l", "profile": {"display_name": "", "real_name": "Alice Liddell"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "user": {"name": "bob", "profile": {"display_name": "Bobby"}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.user_display_name("U1").await.unwrap(), "Alice Liddell");
        assert_eq!(client.user_display_name("U2").await.unwrap(), "Bobby");
    }

    #[tokio::test]
    async fn test_download_file_keeps_extension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/F1/shot.png"))
            .and(header("Authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&server)
            .await;

        let file = RawFile {
            id: "F1".into(),
            name: "shot.png".into(),
            mimetype: "image/png".into(),
            filetype: "png".into(),
            url_private_download: Some(format!("{}/files/F1/shot.png", server.uri())),
        };
        let temp = client_for(&server).await.download_file(&file).await.unwrap();

        let name = temp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("grab-"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(temp.path()).unwrap(), b"PNGDATA");
    }

    #[test]
    fn test_file_extension() {
        let mut file = RawFile {
            name: "notes.txt".into(),
            filetype: "text".into(),
            ..Default::default()
        };
        assert_eq!(file.extension(), Some("txt"));
        file.name = "Makefile".into();
        assert_eq!(file.extension(), Some("text"));
        file.filetype.clear();
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn test_delayed_response_serialization() {
        let body = DelayedResponse::new()
            .with_text("done")
            .in_thread(Some("1.0".into()))
            .replace_original();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["replace_original"], true);
        assert_eq!(json["thread_ts"], "1.0");
        assert!(json.get("blocks").is_none());
    }
}
