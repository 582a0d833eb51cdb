//! Per-checkout mutual exclusion.
//!
//! The checkout token is the concurrency anchor. Every phase that
//! reads-then-writes checkout-derived state holds this mutex for the duration
//! of that phase only; it is never held across an external gateway call.
//! Inside transactions, row locks add cross-process safety on backends that
//! support them.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct CheckoutLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CheckoutLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the mutex for a checkout token, waiting if another completion
    /// phase currently holds it.
    pub async fn acquire(&self, token: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry(token)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drops the registry entry once a checkout is gone.
    pub fn forget(&self, token: Uuid) {
        self.inner.remove(&token);
    }
}
