//! Build-scoped cancellation signal.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Signals that a build (or a teardown) should stop waiting.
///
/// The first reason given to [`cancel`](Self::cancel) sticks; later calls
/// are ignored. Tasks parked in [`cancelled`](Self::cancelled) wake at once.
#[derive(Default)]
pub struct CancellationToken {
    fired: AtomicBool,
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the token.
    pub fn cancel(&self, reason: impl Into<String>) {
        // Reason before flag: a reader that sees the flag also sees the reason.
        let mut slot = self.reason.write();
        if slot.is_some() {
            return;
        }
        let reason = reason.into();
        debug!(reason = %reason, "Cancellation requested");
        *slot = Some(reason);
        self.fired.store(true, Ordering::SeqCst);
        drop(slot);
        self.notify.notify_waiters();
    }

    /// Returns true once the token has been triggered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// The reason given to the first [`cancel`](Self::cancel).
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves with the reason once the token is triggered.
    pub async fn cancelled(&self) -> String {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return self.reason().unwrap_or_default();
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("fired", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
