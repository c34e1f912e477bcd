//! Keyed async locks serializing lifecycle operations on a single token.
//!
//! Renewal and domain updates for the same token must not interleave; a
//! renewal started before an update completes would otherwise bind the old
//! domain list to the newly issued token.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Map of per-key async mutexes, shared between the coordinator and the
/// domain guard.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a key.
    ///
    /// Entries no caller holds anymore are swept on each acquisition, so
    /// the map stays bounded by the number of in-flight operations.
    pub async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
