//! Per-connection sync lock
//!
//! The only mutual-exclusion primitive of the engine: at most one sync run
//! per connection at a time, across tasks and (for shared stores) processes.

use crate::error::StoreError;
use crate::store_trait::Storer;
use std::fmt;
use std::future::Future;
use uuid::Uuid;

/// Held sync lock; dropping it releases the lock
pub struct SyncLockGuard {
    connection_id: Uuid,
    _release: Box<dyn Send + Sync>,
}

impl SyncLockGuard {
    /// Wraps a store-specific handle whose `Drop` releases the lock
    pub fn new(connection_id: Uuid, release: impl Send + Sync + 'static) -> Self {
        Self {
            connection_id,
            _release: Box::new(release),
        }
    }
}

impl fmt::Debug for SyncLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLockGuard")
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

/// Runs `work` while holding the sync lock for `connection_id`.
///
/// Returns `Ok(None)` without calling `work` when the lock is already held,
/// otherwise the result of `work`.
pub async fn with_sync_lock<S, F, Fut, T, E>(store: &S, connection_id: Uuid, work: F) -> Result<Option<T>, E>
where
    S: Storer + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    let Some(guard) = store.try_acquire_sync_lock(connection_id).await? else {
        return Ok(None);
    };
    let result = work().await;
    drop(guard);
    result.map(Some)
}
