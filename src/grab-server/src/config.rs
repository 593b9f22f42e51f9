//! Server configuration.

use std::path::PathBuf;

use anyhow::Context;
use grab_core::WikiCredentials;
use grab_slack::SlackAppConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Slack app credentials.
    pub slack: SlackAppConfig,

    /// Directory for the instance store. Platform default when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Wiki account used when an installer leaves the wiki fields blank.
    #[serde(default)]
    pub default_wiki: Option<WikiCredentials>,

    /// Accept unsigned Slack requests. Development only.
    #[serde(default)]
    pub skip_signature_verification: bool,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

impl ServerConfig {
    /// Configuration with defaults around the given Slack app settings.
    pub fn new(slack: SlackAppConfig) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            slack,
            data_dir: None,
            default_wiki: None,
            skip_signature_verification: false,
            max_body_size: default_max_body_size(),
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables.
    ///
    /// Slack settings come from `SlackAppConfig::from_env`. Grab reads:
    /// - `GRAB_LISTEN_ADDR`
    /// - `GRAB_DATA_DIR`
    /// - `GRAB_WIKI_URL`, `GRAB_WIKI_USERNAME`, `GRAB_WIKI_PASSWORD`, `GRAB_WIKI_DOMAIN`
    /// - `GRAB_SKIP_SIGNATURE_VERIFICATION`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(SlackAppConfig::from_env()?);

        if let Ok(addr) = std::env::var("GRAB_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(dir) = std::env::var("GRAB_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        config.default_wiki = wiki_from_env();

        if let Ok(skip) = std::env::var("GRAB_SKIP_SIGNATURE_VERIFICATION") {
            config.skip_signature_verification = matches!(skip.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.slack.validate()?;
        if let Some(wiki) = &self.default_wiki {
            if !wiki.url.starts_with("http") {
                anyhow::bail!("default wiki URL must be an http(s) URL: {}", wiki.url);
            }
        }
        Ok(())
    }
}

fn wiki_from_env() -> Option<WikiCredentials> {
    let url = std::env::var("GRAB_WIKI_URL").ok().filter(|v| !v.is_empty());
    let username = std::env::var("GRAB_WIKI_USERNAME").ok().filter(|v| !v.is_empty());
    let password = std::env::var("GRAB_WIKI_PASSWORD").ok().filter(|v| !v.is_empty());

    match (url, username, password) {
        (Some(url), Some(username), Some(password)) => Some(
            WikiCredentials::new(url, username, password)
                .with_domain(std::env::var("GRAB_WIKI_DOMAIN").ok()),
        ),
        (None, None, None) => None,
        _ => {
            warn!("GRAB_WIKI_URL, GRAB_WIKI_USERNAME and GRAB_WIKI_PASSWORD must be set together, ignoring default wiki");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"slack": {"signing_secret": "s3cret"}}"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.slack.signing_secret(), "s3cret");
        assert!(config.default_wiki.is_none());
        assert!(!config.skip_signature_verification);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_with_default_wiki() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "listen_addr": "127.0.0.1:8080",
                "slack": {"signing_secret": "s3cret", "client_id": "1.2", "client_secret": "abc"},
                "default_wiki": {"url": "https://wiki.example.org", "username": "GrabBot", "password": "pw"}
            }"#,
        )
        .unwrap();
        assert!(config.slack.has_oauth());
        let wiki = config.default_wiki.as_ref().unwrap();
        assert_eq!(wiki.username, "GrabBot");
        assert!(!format!("{:?}", config).contains("\"pw\""));
    }

    #[test]
    fn test_validate_rejects_bad_wiki_url() {
        let mut config = ServerConfig::new(SlackAppConfig::new("s3cret"));
        config.default_wiki = Some(WikiCredentials::new("wiki.example.org", "u", "p"));
        assert!(config.validate().is_err());
    }
}
