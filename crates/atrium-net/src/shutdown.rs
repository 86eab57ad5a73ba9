//! Graceful-stop signal shared between a listener and its connection tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// One-shot stop request carrying the drain grace period.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<Duration>>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// A signal that has not fired.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop with `grace` for in-flight work. Only the first call has
    /// any effect; returns whether this call fired the signal.
    pub fn trigger(&self, grace: Duration) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(grace);
            true
        })
    }

    /// Whether a stop has been requested.
    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Grace period of the pending stop.
    pub fn grace(&self) -> Option<Duration> {
        *self.tx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(Option::is_some).await;
    }
}
