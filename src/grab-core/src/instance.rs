//! Tenant records and the store contract used to resolve them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeResult;

/// Wiki account used to publish on behalf of one tenant.
#[derive(Clone, Serialize, Deserialize)]
pub struct WikiCredentials {
    /// Base URL of the wiki, e.g. `https://wiki.example.org`.
    pub url: String,
    /// Bot account name.
    pub username: String,
    /// Bot account password.
    #[serde(with = "secret_string")]
    pub password: SecretString,
    /// Authentication domain, for LDAP-backed wikis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl WikiCredentials {
    /// Create credentials without an authentication domain.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            domain: None,
        }
    }

    /// Set the authentication domain. Blank domains are ignored.
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|d| !d.trim().is_empty());
        self
    }
}

impl std::fmt::Debug for WikiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .finish()
    }
}

/// One installed chat organization with its paired wiki account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Record identifier.
    pub id: Uuid,
    /// Chat workspace (team) ID.
    pub slack_team_id: String,
    /// Chat enterprise (org) ID, for grid installs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_enterprise_id: Option<String>,
    /// Bot access token for the workspace.
    #[serde(with = "secret_string")]
    pub slack_access_token: SecretString,
    /// User ID of the installed bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_bot_user_id: Option<String>,
    /// Destination wiki account.
    pub wiki: WikiCredentials,
    /// When the app was installed.
    pub installed_at: DateTime<Utc>,
}

impl Instance {
    /// Create a fresh record for a workspace install.
    pub fn new(
        slack_team_id: impl Into<String>,
        slack_access_token: impl Into<String>,
        wiki: WikiCredentials,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slack_team_id: slack_team_id.into(),
            slack_enterprise_id: None,
            slack_access_token: SecretString::from(slack_access_token.into()),
            slack_bot_user_id: None,
            wiki,
            installed_at: Utc::now(),
        }
    }

    /// Whether this record belongs to the given team or enterprise ID.
    pub fn matches_org(&self, org_id: &str) -> bool {
        self.slack_team_id == org_id || self.slack_enterprise_id.as_deref() == Some(org_id)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("slack_team_id", &self.slack_team_id)
            .field("slack_enterprise_id", &self.slack_enterprise_id)
            .field("slack_access_token", &"[REDACTED]")
            .field("slack_bot_user_id", &self.slack_bot_user_id)
            .field("wiki", &self.wiki)
            .field("installed_at", &self.installed_at)
            .finish()
    }
}

/// Credential store read/write contract.
///
/// Lookups return `BridgeError::TenantNotFound` when nothing matches.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Resolve by chat organization ID (team or enterprise).
    async fn resolve_by_org_id(&self, org_id: &str) -> BridgeResult<Instance>;

    /// Resolve by the team of the user who triggered an event.
    async fn resolve_by_user_team(&self, team_id: &str) -> BridgeResult<Instance>;

    /// Insert or replace the record for `instance.slack_team_id`.
    async fn upsert(&self, instance: Instance) -> BridgeResult<()>;

    /// Delete the record for a team. Returns whether one existed.
    async fn remove_by_team(&self, team_id: &str) -> BridgeResult<bool>;
}

/// Serde helpers storing a `SecretString` as a plain string.
pub mod secret_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString::from(value))
    }
}

/// Same as `secret_string`, for optional secrets.
pub mod optional_secret_string {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        secret: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match secret {
            Some(secret) => serializer.serialize_some(secret.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
    }
}
