//! Shutdown coordination for the gateway.
//!
//! Triggering is sticky: a listener that subscribes after the trigger still
//! observes it, so a signal that arrives during startup is not lost.

use std::sync::Arc;

use tokio::sync::watch;

/// Coordinator for graceful shutdown, shared by the signal handler and startup.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal handed to one listener.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal(self.tx.subscribe())
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once shutdown has been triggered.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Wait for the trigger. A dropped coordinator also counts as shutdown.
    pub async fn recv(&mut self) {
        let _ = self.0.wait_for(|triggered| *triggered).await;
    }
}
