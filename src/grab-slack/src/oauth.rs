//! OAuth v2 installation.
//!
//! # OAuth Scopes
//!
//! The following bot scopes are required:
//! - `app_mentions:read` - Receive @mentions
//! - `channels:history` / `groups:history` - Read threads to transcribe
//! - `chat:write` - Post private notices
//! - `commands` - Provide the message shortcut
//! - `files:read` - Download attachments
//! - `users:read` - Resolve display names
//!
//! The HTTP routes live in the server; this module only builds the
//! authorize URL and exchanges the returned code.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SlackAppConfig;
use crate::error::{SlackApiError, SlackError, SlackResult};

/// Required OAuth scopes for the Slack bot.
pub const REQUIRED_SCOPES: &[&str] = &[
    "app_mentions:read",
    "channels:history",
    "groups:history",
    "chat:write",
    "commands",
    "files:read",
    "users:read",
];

const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";

/// Response from Slack OAuth token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    /// Whether the request was successful.
    pub ok: bool,
    /// Access token for the bot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Token type (usually "bot").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scopes granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Bot user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
    /// App ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Team information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<OAuthTeam>,
    /// Enterprise information, for grid installs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<OAuthTeam>,
    /// Error message (if ok is false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Team or enterprise information from OAuth response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTeam {
    /// Team ID.
    pub id: String,
    /// Team name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A completed installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub team_id: String,
    pub team_name: Option<String>,
    pub enterprise_id: Option<String>,
    pub bot_user_id: Option<String>,
    pub access_token: String,
}

impl TryFrom<OAuthTokenResponse> for Installation {
    type Error = SlackError;

    fn try_from(response: OAuthTokenResponse) -> SlackResult<Self> {
        if !response.ok {
            let code = response.error.unwrap_or_else(|| "unknown".to_string());
            return Err(SlackApiError::new(code.clone(), format!("oauth.v2.access: {code}")).into());
        }
        let team = response
            .team
            .ok_or_else(|| SlackError::InvalidPayload("token response has no team".to_string()))?;
        let access_token = response.access_token.ok_or_else(|| {
            SlackError::InvalidPayload("token response has no access token".to_string())
        })?;

        Ok(Self {
            team_id: team.id,
            team_name: team.name,
            enterprise_id: response.enterprise.map(|e| e.id),
            bot_user_id: response.bot_user_id,
            access_token,
        })
    }
}

/// OAuth client built from the app configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: Option<String>,
    api_base: String,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Create an OAuth client. Fails when the app has no OAuth credentials.
    pub fn from_config(config: &SlackAppConfig) -> SlackResult<Self> {
        let client_id = config
            .client_id()
            .ok_or_else(|| SlackError::Config("OAuth client_id not configured".to_string()))?
            .to_string();

        let client_secret = config
            .client_secret()
            .ok_or_else(|| SlackError::Config("OAuth client_secret not configured".to_string()))?;
        let client_secret = SecretString::from(client_secret.to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: config.redirect_uri().map(str::to_string),
            api_base: config.api_base().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// URL of Slack's consent page, carrying `state` for the callback.
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&REQUIRED_SCOPES.join(",")),
            urlencoding::encode(state),
        );
        if let Some(redirect_uri) = &self.redirect_uri {
            url.push_str("&redirect_uri=");
            url.push_str(&urlencoding::encode(redirect_uri));
        }
        url
    }

    /// Exchange an authorization code for a bot token.
    pub async fn exchange_code(&self, code: &str) -> SlackResult<Installation> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }

        debug!("Exchanging OAuth code");
        let response = self
            .http
            .post(format!("{}/oauth.v2.access", self.api_base))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!(
                "Token exchange failed with status {}: {}",
                status, body
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await?;
        let installation = Installation::try_from(token_response)?;
        info!(
            team = %installation.team_id,
            name = installation.team_name.as_deref().unwrap_or("unknown"),
            "OAuth exchange succeeded"
        );
        Ok(installation)
    }
}
