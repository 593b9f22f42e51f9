//! In-process publish locks.
//!
//! Serializes concurrent publishes that target the same
//! `(tenant, article, section)` inside one server process. Publishes from
//! other processes can still interleave with the existence check.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockKey = (String, String, String);

/// Map of per-destination async mutexes.
#[derive(Debug, Clone, Default)]
pub struct PublishLocks {
    inner: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl PublishLocks {
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one article section. An empty `section`
    /// locks the whole-article destination.
    pub async fn acquire(&self, tenant: &str, title: &str, section: &str) -> PublishGuard {
        let key = (tenant.to_string(), page_key(title), section.to_string());
        let mutex = self
            .inner
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        debug!(tenant, title, section, "Publish lock acquired");

        PublishGuard {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of destinations currently locked or waited on.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no destination is locked.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The page a wiki title resolves to: underscores and runs of whitespace
/// become one space and the first letter is upper-cased.
fn page_key(title: &str) -> String {
    let spaced = title.replace('_', " ");
    let mut words = spaced.split_whitespace();
    let mut key = String::with_capacity(title.len());
    if let Some(first) = words.next() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            key.extend(c.to_uppercase());
            key.push_str(chars.as_str());
        }
    }
    for word in words {
        key.push(' ');
        key.push_str(word);
    }
    key
}

/// Held for the duration of one publish. Releases on drop.
#[derive(Debug)]
pub struct PublishGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the entry once nobody else holds or waits on it.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
