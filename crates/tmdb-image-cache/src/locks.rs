//! Per-key download coordination

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One mutex per cache key, created on first use.
///
/// Entries are never removed. The key space is bounded by the set of posters the
/// process is asked for, which is small for a long-running server.
#[derive(Default)]
pub struct DownloadLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DownloadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`.
    ///
    /// The guard is owned so it can be moved into a spawned download task and
    /// outlive the caller that acquired it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys that have ever been locked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
