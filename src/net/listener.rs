//! QUIC listener with backpressure.
//!
//! # Responsibilities
//! - Bind the UDP endpoint for HTTP/3
//! - Accept incoming QUIC connections
//! - Enforce max_connections limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A bounded QUIC listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections wait in the endpoint's queue until a slot becomes available.
pub struct QuicListener {
    endpoint: quinn::Endpoint,
    connection_limit: Arc<Semaphore>,
}

impl QuicListener {
    /// Bind the HTTP/3 endpoint. Must be called from within a Tokio runtime.
    pub fn bind(
        bind_address: &str,
        server_config: quinn::ServerConfig,
        max_connections: usize,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr = bind_address.parse().map_err(|source| ListenerError::Address {
            address: bind_address.to_string(),
            source,
        })?;

        let endpoint = quinn::Endpoint::server(server_config, addr)
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        let local_addr = endpoint
            .local_addr()
            .map_err(|source| ListenerError::Bind { address: addr, source })?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "QUIC listener bound"
        );

        Ok(Self {
            endpoint,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept the next incoming connection, respecting the connection limit.
    ///
    /// Returns `None` once the endpoint has been closed. The permit must be
    /// held for the connection's lifetime.
    pub async fn accept(&self) -> Option<(quinn::Incoming, ConnectionPermit)> {
        // Acquire permit first (backpressure)
        let permit = self.connection_limit.clone().acquire_owned().await.ok()?;
        let incoming = self.endpoint.accept().await?;

        tracing::debug!(
            peer_addr = %incoming.remote_address(),
            available_permits = self.connection_limit.available_permits(),
            "Connection incoming"
        );

        Some((incoming, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.endpoint.local_addr()
    }

    /// Stop accepting and close every connection.
    pub fn close(&self) {
        self.connection_limit.close();
        self.endpoint.close(0u32.into(), b"shutting down");
    }

    /// Wait for all connections to be cleanly shut down.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

/// A connection slot, released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
