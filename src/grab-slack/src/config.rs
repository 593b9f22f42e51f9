//! Configuration for the Slack app.
//!
//! Only app-level settings live here. Per-workspace bot tokens are stored
//! on the tenant `Instance` and handed to `SlackClient` per request.

use grab_core::instance::{optional_secret_string, secret_string};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::DEFAULT_API_BASE;
use crate::error::{SlackError, SlackResult};

/// App-level Slack configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackAppConfig {
    /// Signing secret for request verification.
    #[serde(with = "secret_string")]
    signing_secret: SecretString,
    /// OAuth client ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    /// OAuth client secret.
    #[serde(
        default,
        with = "optional_secret_string",
        skip_serializing_if = "Option::is_none"
    )]
    client_secret: Option<SecretString>,
    /// Redirect URI registered for OAuth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<String>,
    /// Web API base URL.
    #[serde(default = "default_api_base")]
    api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl std::fmt::Debug for SlackAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackAppConfig")
            .field("signing_secret", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SlackAppConfig {
    /// Create a configuration with only a signing secret.
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: SecretString::from(signing_secret.into()),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            api_base: default_api_base(),
        }
    }

    /// Set OAuth client credentials.
    pub fn with_oauth(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::from(client_secret.into()));
        self.redirect_uri = redirect_uri;
        self
    }

    /// Point Web API calls somewhere else.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SLACK_SIGNING_SECRET`
    ///
    /// Optional:
    /// - `SLACK_CLIENT_ID`
    /// - `SLACK_CLIENT_SECRET`
    /// - `SLACK_REDIRECT_URI`
    /// - `SLACK_API_BASE`
    pub fn from_env() -> SlackResult<Self> {
        let signing_secret = std::env::var("SLACK_SIGNING_SECRET")
            .map_err(|_| SlackError::Config("SLACK_SIGNING_SECRET not set".to_string()))?;

        let mut config = Self::new(signing_secret);

        match (
            std::env::var("SLACK_CLIENT_ID"),
            std::env::var("SLACK_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => {
                let redirect_uri = std::env::var("SLACK_REDIRECT_URI").ok();
                config = config.with_oauth(client_id, client_secret, redirect_uri);
            }
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("Only one of SLACK_CLIENT_ID / SLACK_CLIENT_SECRET is set, OAuth disabled");
            }
            _ => {}
        }

        if let Ok(api_base) = std::env::var("SLACK_API_BASE") {
            config = config.with_api_base(api_base);
        }

        Ok(config)
    }

    /// Get the signing secret.
    pub fn signing_secret(&self) -> &str {
        self.signing_secret.expose_secret()
    }

    /// Get the OAuth client ID.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Get the OAuth client secret.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_ref().map(|s| s.expose_secret())
    }

    /// Get the OAuth redirect URI.
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Web API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Check if OAuth is configured.
    pub fn has_oauth(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SlackResult<()> {
        if self.signing_secret.expose_secret().is_empty() {
            return Err(SlackError::Config("Signing secret is empty".to_string()));
        }
        if !self.api_base.starts_with("http") {
            return Err(SlackError::Config(format!(
                "API base must be an http(s) URL: {}",
                self.api_base
            )));
        }
        Ok(())
    }
}
