//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track active QUIC connections for shutdown and metrics
//! - Signal in-flight requests when their connection goes away

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::observability::metrics;

/// Source of connection IDs; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks active connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(active);

        let (closed_tx, _) = watch::channel(false);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            closed_tx,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
///
/// Dropping it decrements the active count and fires every
/// [`DisconnectSignal`] handed out for this connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    closed_tx: watch::Sender<bool>,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// A signal that resolves once this connection is gone.
    pub fn disconnect_signal(&self) -> DisconnectSignal {
        DisconnectSignal(self.closed_tx.subscribe())
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.closed_tx.send_replace(true);
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_connections(active);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Resolves when the client connection that carried a request has closed.
#[derive(Debug, Clone)]
pub struct DisconnectSignal(watch::Receiver<bool>);

impl DisconnectSignal {
    pub fn is_disconnected(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Wait until the connection closes.
    pub async fn disconnected(&mut self) {
        // An error means the sender is gone, which is also a disconnect.
        let _ = self.0.wait_for(|closed| *closed).await;
    }
}
