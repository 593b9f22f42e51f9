//! JSON-file-backed instance store.
//!
//! All records live in one file, loaded at startup and rewritten on every
//! change. Writes go to a sibling temp file first and are renamed into place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use grab_core::{BridgeError, BridgeResult, Instance, InstanceStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::paths::{grab_data_dir, instances_path};

/// Instance store persisted as a JSON array.
#[derive(Debug)]
pub struct FileInstanceStore {
    path: PathBuf,
    instances: RwLock<HashMap<String, Instance>>,
}

impl FileInstanceStore {
    /// Open the store in the default data directory.
    pub async fn open_default() -> Result<Self> {
        let dir = grab_data_dir()?;
        Self::open(instances_path(&dir)).await
    }

    /// Open (or start) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let instances = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let records: Vec<Instance> =
                serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            records
                .into_iter()
                .map(|instance| (instance.slack_team_id.clone(), instance))
                .collect()
        } else {
            HashMap::new()
        };

        info!(path = %path.display(), instances = instances.len(), "Instance store opened");
        Ok(Self {
            path,
            instances: RwLock::new(instances),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored installations.
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Whether nothing is installed.
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }

    async fn persist(&self, instances: &HashMap<String, Instance>) -> Result<()> {
        let mut records: Vec<&Instance> = instances.values().collect();
        records.sort_by(|a, b| a.slack_team_id.cmp(&b.slack_team_id));
        let content = serde_json::to_string_pretty(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, content.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), count = records.len(), "Instance store saved");
        Ok(())
    }
}

/// Write `content` to a fresh file that is owner-only from the moment it
/// exists. The store holds tokens and passwords.
pub(crate) async fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl InstanceStore for FileInstanceStore {
    async fn resolve_by_org_id(&self, org_id: &str) -> BridgeResult<Instance> {
        let instances = self.instances.read().await;
        instances
            .get(org_id)
            .or_else(|| instances.values().find(|i| i.matches_org(org_id)))
            .cloned()
            .ok_or_else(|| BridgeError::TenantNotFound(org_id.to_string()))
    }

    async fn resolve_by_user_team(&self, team_id: &str) -> BridgeResult<Instance> {
        self.instances
            .read()
            .await
            .get(team_id)
            .cloned()
            .ok_or_else(|| BridgeError::TenantNotFound(team_id.to_string()))
    }

    async fn upsert(&self, instance: Instance) -> BridgeResult<()> {
        let mut instances = self.instances.write().await;
        let team_id = instance.slack_team_id.clone();
        let previous = instances.insert(team_id.clone(), instance);
        let replaced = previous.is_some();
        if let Err(e) = self.persist(&instances).await {
            // Keep memory and disk in agreement.
            match previous {
                Some(previous) => instances.insert(team_id, previous),
                None => instances.remove(&team_id),
            };
            return Err(e.into());
        }
        info!(team = %team_id, replaced, "Instance saved");
        Ok(())
    }

    async fn remove_by_team(&self, team_id: &str) -> BridgeResult<bool> {
        let mut instances = self.instances.write().await;
        let Some(removed) = instances.remove(team_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&instances).await {
            instances.insert(team_id.to_string(), removed);
            return Err(e.into());
        }
        info!(team = %team_id, "Instance removed");
        Ok(true)
    }
}
