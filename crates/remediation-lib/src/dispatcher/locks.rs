//! Keyed async locks that serialize remediation of the same object

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of per-target mutexes. Entries are created on first use and removed
/// when the last holder or waiter lets go.
#[derive(Clone, Default)]
pub struct TargetLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> TargetGuard {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Registered before waiting so a cancelled waiter still prunes
        let registration = Registration {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
        };
        let guard = mutex.lock_owned().await;
        TargetGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of targets currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one remediation
pub struct TargetGuard {
    // Field order matters: the mutex is released before the entry is pruned
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

/// Interest in one key, held by both waiters and holders. Whichever drops
/// last removes the idle entry.
struct Registration {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
