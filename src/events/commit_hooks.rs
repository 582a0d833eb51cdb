//! Post-commit side-effect queue.
//!
//! Side effects (order-created hooks, confirmation emails, events) are
//! enqueued while a database transaction is open and dispatched only after
//! the transaction has committed. If the transaction rolls back the queue is
//! dropped and nothing runs.

use futures::future::BoxFuture;
use std::future::Future;
use tracing::debug;

#[derive(Default)]
pub struct CommitHooks {
    hooks: Vec<BoxFuture<'static, ()>>,
}

impl CommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a side effect to run after the enclosing transaction commits.
    /// The future must own its captures; the transaction outlives nothing.
    pub fn on_commit<F>(&mut self, effect: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push(Box::pin(effect));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every queued side effect in enqueue order. Call strictly after
    /// a confirmed commit.
    pub async fn dispatch(self) {
        let count = self.hooks.len();
        for hook in self.hooks {
            hook.await;
        }
        debug!(count, "post-commit hooks dispatched");
    }

    /// Drops the queue without running anything; used on rollback.
    pub fn discard(self) {
        debug!(count = self.hooks.len(), "post-commit hooks discarded");
    }
}
