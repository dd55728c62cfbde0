//! Cooperative shutdown signal
//!
//! A set-once flag shared by every pipeline stage. Stages check it at their
//! loop checkpoints (frame dequeue, fragment receipt, segment dispatch) and
//! wind down on their own; nothing is aborted mid-operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Set-once cancellation signal. Cloning shares the underlying flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter. Idempotent, never revoked.
    pub fn trigger(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Wait until the signal fires. Returns immediately if already set.
    pub async fn cancelled(&self) {
        if self.is_set() {
            return;
        }

        // Register before the re-check so a trigger between the check and
        // the await cannot be lost.
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_set() {
            return;
        }

        notified.await;
    }
}
