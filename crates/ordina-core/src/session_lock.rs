//! Per-session mutual exclusion. Two concurrent turns for the same
//! session must not interleave their history appends; turns for
//! different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Semaphore>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to a session. The returned guard releases
    /// the lock on drop.
    pub async fn acquire(&self, session_id: Uuid) -> SessionGuard {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        // The semaphore is never closed, so acquisition cannot fail.
        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("session semaphore closed"),
        };
        SessionGuard { _permit: permit }
    }

    /// Forget semaphores for sessions nobody currently holds or waits on.
    pub async fn prune(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, sem| sem.available_permits() < 1);
    }
}

pub struct SessionGuard {
    _permit: OwnedSemaphorePermit,
}
