//! In-memory instance store, for tests and single-process development.

use async_trait::async_trait;
use dashmap::DashMap;
use grab_core::{BridgeError, BridgeResult, Instance, InstanceStore};

/// Instance store that forgets everything on restart.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    instances: DashMap<String, Instance>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given installations.
    pub fn with_instances(instances: impl IntoIterator<Item = Instance>) -> Self {
        let store = Self::new();
        for instance in instances {
            store
                .instances
                .insert(instance.slack_team_id.clone(), instance);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn resolve_by_org_id(&self, org_id: &str) -> BridgeResult<Instance> {
        if let Some(instance) = self.instances.get(org_id) {
            return Ok(instance.value().clone());
        }
        self.instances
            .iter()
            .find(|entry| entry.value().matches_org(org_id))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::TenantNotFound(org_id.to_string()))
    }

    async fn resolve_by_user_team(&self, team_id: &str) -> BridgeResult<Instance> {
        self.instances
            .get(team_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::TenantNotFound(team_id.to_string()))
    }

    async fn upsert(&self, instance: Instance) -> BridgeResult<()> {
        self.instances
            .insert(instance.slack_team_id.clone(), instance);
        Ok(())
    }

    async fn remove_by_team(&self, team_id: &str) -> BridgeResult<bool> {
        Ok(self.instances.remove(team_id).is_some())
    }
}
