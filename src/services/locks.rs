//! Per-user cart locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per user. Every cart mutation and the order
/// materialization for that user's cart run while holding it, so a cart has
/// a single writer within this process.
///
/// Entries live only while someone holds or waits on them.
#[derive(Clone, Debug, Default)]
pub struct CartLocks {
    locks: Arc<LockMap>,
}

impl CartLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: Uuid) -> CartGuard {
        let mutex = self.locks.entry(user_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        CartGuard { guard: Some(guard), locks: self.locks.clone(), user_id }
    }

    /// Users with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a user's cart lock; the map entry is dropped with the last holder.
#[must_use = "the cart is unlocked as soon as the guard is dropped"]
pub struct CartGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    user_id: Uuid,
}

impl std::fmt::Debug for CartGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartGuard").field("user_id", &self.user_id).finish()
    }
}

impl Drop for CartGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Holders and waiters each own a clone, taken under the same shard lock.
        self.locks.remove_if(&self.user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
