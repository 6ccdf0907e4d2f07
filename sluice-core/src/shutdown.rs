//! Stop requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A cloneable handle for requesting a graceful stop of a run.
///
/// Requesting a stop never interrupts a tick; the scheduler observes the flag
/// on its next evaluation pass and proceeds through normal termination.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Create a handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake a waiting scheduler.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested.
    pub async fn notified(&self) {
        if self.is_requested() {
            return;
        }
        self.notify.notified().await;
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::Release);
    }
}
