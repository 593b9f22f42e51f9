//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use grab_core::{Instance, InstanceStore, PublishLocks, WikiCredentials};
use grab_mediawiki::{MediaWikiBridge, MediaWikiClient};
use grab_slack::{OAuthClient, SignatureVerifier, SlackClient, SlackSource};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// How long wiki credentials wait for the OAuth callback.
pub const PENDING_INSTALL_TTL: Duration = Duration::from_secs(10 * 60);

const STATE_TOKEN_LEN: usize = 32;

/// Wiki credentials entered on the install page, waiting for Slack to
/// redirect back.
struct PendingInstall {
    wiki: WikiCredentials,
    created_at: Instant,
}

/// Application state shared across request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Installed workspaces.
    pub store: Arc<dyn InstanceStore>,
    /// Per-destination publish locks.
    pub locks: PublishLocks,
    verifier: SignatureVerifier,
    oauth: Option<OAuthClient>,
    pending_installs: DashMap<String, PendingInstall>,
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("pending_installs", &self.pending_installs.len())
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create application state over an instance store.
    pub fn new(config: ServerConfig, store: Arc<dyn InstanceStore>) -> AppResult<Self> {
        let oauth = if config.slack.has_oauth() {
            Some(OAuthClient::from_config(&config.slack)?)
        } else {
            None
        };

        Ok(Self {
            verifier: SignatureVerifier::new(config.slack.signing_secret()),
            config,
            store,
            locks: PublishLocks::new(),
            oauth,
            pending_installs: DashMap::new(),
            start_time: Instant::now(),
        })
    }

    /// Start background cleanup of abandoned installs.
    /// Call this after wrapping AppState in Arc.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let state = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let removed = state.cleanup_expired_installs();
                if removed > 0 {
                    debug!("Cleaned up {} abandoned installs", removed);
                }
            }
        });
    }

    /// Request signature verifier.
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// OAuth client, when the app has OAuth credentials.
    pub fn oauth(&self) -> AppResult<&OAuthClient> {
        self.oauth
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("OAuth is not configured".to_string()))
    }

    /// Time since startup.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Park wiki credentials and return the OAuth `state` token that claims
    /// them.
    pub fn park_install(&self, wiki: WikiCredentials) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_TOKEN_LEN)
            .map(char::from)
            .collect();
        self.pending_installs.insert(
            token.clone(),
            PendingInstall {
                wiki,
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Claim parked credentials. Each token works once.
    pub fn take_install(&self, token: &str) -> Option<WikiCredentials> {
        let (_, pending) = self.pending_installs.remove(token)?;
        (pending.created_at.elapsed() < PENDING_INSTALL_TTL).then_some(pending.wiki)
    }

    /// Drop parked credentials older than the TTL.
    pub fn cleanup_expired_installs(&self) -> usize {
        let before = self.pending_installs.len();
        self.pending_installs
            .retain(|_, pending| pending.created_at.elapsed() < PENDING_INSTALL_TTL);
        before - self.pending_installs.len()
    }

    /// Slack side of a publish run for one tenant.
    pub fn chat_for(&self, instance: &Instance) -> AppResult<SlackSource> {
        let client = SlackClient::new(instance.slack_access_token.expose_secret())?
            .with_api_base(self.config.slack.api_base());
        Ok(SlackSource::new(client))
    }

    /// Wiki side of a publish run for one tenant.
    pub fn wiki_for(&self, instance: &Instance) -> AppResult<MediaWikiBridge<MediaWikiClient>> {
        Ok(MediaWikiBridge::connect(instance.wiki.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grab_slack::SlackAppConfig;
    use grab_storage::MemoryInstanceStore;

    fn state() -> AppState {
        AppState::new(
            ServerConfig::new(SlackAppConfig::new("s3cret")),
            Arc::new(MemoryInstanceStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_install_token_is_single_use() {
        let state = state();
        let token = state.park_install(WikiCredentials::new("https://wiki", "u", "p"));
        assert_eq!(token.len(), STATE_TOKEN_LEN);

        assert_eq!(state.take_install(&token).unwrap().username, "u");
        assert!(state.take_install(&token).is_none());
        assert!(state.take_install("forged").is_none());
    }

    #[test]
    fn test_cleanup_keeps_fresh_installs() {
        let state = state();
        state.park_install(WikiCredentials::new("https://wiki", "u", "p"));
        assert_eq!(state.cleanup_expired_installs(), 0);
    }

    #[test]
    fn test_oauth_unavailable_without_credentials() {
        assert!(matches!(state().oauth(), Err(AppError::Unavailable(_))));
    }
}
