use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide table of per-name mutexes.
///
/// One entry per sanitized file name, created on first use and kept
/// for the life of the table. Dropping the returned guard releases the
/// lock on every exit path, including errors mid-operation.
pub struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Take the lock for `name`, waiting if another task holds it.
    ///
    /// At most one holder proceeds per name; locks on distinct names
    /// never interact. No wake-up order among waiters is promised.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(name.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}
