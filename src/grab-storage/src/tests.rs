//! File store tests against a temporary data directory.

use grab_core::{BridgeError, Instance, InstanceStore, WikiCredentials};
use secrecy::ExposeSecret;
use tempfile::TempDir;

use crate::{FileInstanceStore, StorageError, instances_path};

fn instance(team: &str, wiki_user: &str) -> Instance {
    Instance::new(
        team,
        format!("xoxb-{team}"),
        WikiCredentials::new("https://wiki.example.org", wiki_user, "hunter2")
            .with_domain(Some("CORP".into())),
    )
}

#[tokio::test]
async fn test_open_empty_directory() {
    let dir = TempDir::new().unwrap();
    let store = FileInstanceStore::open(instances_path(&dir.path().join("nested")))
        .await
        .unwrap();
    assert!(store.is_empty().await);
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = instances_path(dir.path());

    let store = FileInstanceStore::open(&path).await.unwrap();
    store.upsert(instance("T1", "GrabBot")).await.unwrap();
    store.upsert(instance("T2", "OtherBot")).await.unwrap();
    drop(store);

    let reopened = FileInstanceStore::open(&path).await.unwrap();
    assert_eq!(reopened.len().await, 2);

    let found = reopened.resolve_by_user_team("T1").await.unwrap();
    assert_eq!(found.wiki.username, "GrabBot");
    assert_eq!(found.wiki.password.expose_secret(), "hunter2");
    assert_eq!(found.wiki.domain.as_deref(), Some("CORP"));
    assert_eq!(found.slack_access_token.expose_secret(), "xoxb-T1");
}

#[tokio::test]
async fn test_upsert_replaces_by_team() {
    let dir = TempDir::new().unwrap();
    let store = FileInstanceStore::open(instances_path(dir.path()))
        .await
        .unwrap();

    store.upsert(instance("T1", "OldBot")).await.unwrap();
    store.upsert(instance("T1", "NewBot")).await.unwrap();

    assert_eq!(store.len().await, 1);
    let found = store.resolve_by_org_id("T1").await.unwrap();
    assert_eq!(found.wiki.username, "NewBot");
}

#[tokio::test]
async fn test_resolve_by_enterprise_id() {
    let dir = TempDir::new().unwrap();
    let store = FileInstanceStore::open(instances_path(dir.path()))
        .await
        .unwrap();

    let mut grid = instance("T1", "GrabBot");
    grid.slack_enterprise_id = Some("E1".into());
    store.upsert(grid).await.unwrap();

    assert_eq!(store.resolve_by_org_id("E1").await.unwrap().slack_team_id, "T1");
    assert!(matches!(
        store.resolve_by_user_team("E1").await,
        Err(BridgeError::TenantNotFound(id)) if id == "E1"
    ));
}

#[tokio::test]
async fn test_remove_persists() {
    let dir = TempDir::new().unwrap();
    let path = instances_path(dir.path());

    let store = FileInstanceStore::open(&path).await.unwrap();
    store.upsert(instance("T1", "GrabBot")).await.unwrap();
    assert!(store.remove_by_team("T1").await.unwrap());
    assert!(!store.remove_by_team("T1").await.unwrap());

    let reopened = FileInstanceStore::open(&path).await.unwrap();
    assert!(reopened.is_empty().await);
}

#[tokio::test]
async fn test_corrupt_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = instances_path(dir.path());
    std::fs::write(&path, "{not json").unwrap();

    let err = FileInstanceStore::open(&path).await.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = FileInstanceStore::open(instances_path(dir.path()))
        .await
        .unwrap();
    store.upsert(instance("T1", "GrabBot")).await.unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[tokio::test]
async fn test_private_write_is_owner_only_from_creation() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("instances.json.tmp");
    // A stale world-readable leftover from an interrupted save.
    std::fs::write(&path, "old").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    crate::file::write_private(&path, b"[]").await.unwrap();

    let meta = std::fs::metadata(&path).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
}
