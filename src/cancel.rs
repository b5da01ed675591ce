//! Cooperative cancellation for a running merge

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A token that can be used to check if the run has been cancelled
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the token once `timeout` has elapsed
    pub fn cancel_after(&self, timeout: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            log::warn!("Timed out after {:?}, cancelling", timeout);
            token.cancel();
        });
    }
}
