//! HTTP/3 server.
//!
//! # Responsibilities
//! - Accept QUIC connections from the listener
//! - Drive one HTTP/3 connection per task
//! - Spawn one task per request and hand it to the gateway core
//! - Stop accepting on shutdown and close the endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::http::Request;
use bytes::Bytes;
use h3::error::ErrorLevel;
use tracing::Instrument;

use crate::http::body;
use crate::http::gateway::Gateway;
use crate::http::request::InboundRequest;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::QuicListener;

/// How long to wait for connections to close after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("quic handshake failed: {0}")]
    Handshake(#[from] quinn::ConnectionError),
    #[error("http/3 setup failed: {0}")]
    H3(#[from] h3::Error),
}

/// HTTP/3 front of the gateway.
pub struct HttpServer {
    gateway: Arc<Gateway>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: QuicListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP/3 server starting");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let Some((incoming, permit)) = accepted else {
                        break;
                    };
                    let gateway = Arc::clone(&self.gateway);
                    let guard = self.tracker.track();
                    let span = tracing::info_span!(
                        "connection",
                        connection_id = %guard.id(),
                        peer = %incoming.remote_address(),
                    );

                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            if let Err(e) = serve_connection(incoming, gateway, guard).await {
                                tracing::warn!(error = %e, "Connection failed");
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        listener.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, listener.wait_idle()).await.is_err() {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Connections did not drain in time"
            );
        }

        tracing::info!("HTTP/3 server stopped");
        Ok(())
    }
}

async fn serve_connection(
    incoming: quinn::Incoming,
    gateway: Arc<Gateway>,
    guard: ConnectionGuard,
) -> Result<(), ConnectionError> {
    let connection = incoming.await?;
    let quic = connection.clone();
    tracing::debug!("QUIC handshake complete");

    let mut h3_conn: h3::server::Connection<h3_quinn::Connection, Bytes> =
        h3::server::Connection::new(h3_quinn::Connection::new(connection)).await?;

    loop {
        match h3_conn.accept().await {
            Ok(Some((request, stream))) => {
                let gateway = Arc::clone(&gateway);
                let disconnect = guard.disconnect_signal();

                tokio::spawn(
                    async move {
                        let (mut send, recv) = stream.split();
                        let (parts, ()) = request.into_parts();
                        let inbound = InboundRequest::from_http(Request::from_parts(
                            parts,
                            body::from_h3(recv),
                        ));
                        gateway.handle(inbound, &mut send, Some(disconnect)).await;
                    }
                    .in_current_span(),
                );
            }
            Ok(None) => {
                tracing::debug!("Client stopped opening requests");
                break;
            }
            Err(e) => match e.get_error_level() {
                ErrorLevel::ConnectionError => {
                    tracing::debug!(error = %e, "HTTP/3 connection closed");
                    break;
                }
                ErrorLevel::StreamError => {
                    tracing::debug!(error = %e, "Rejected malformed request stream");
                    continue;
                }
            },
        }
    }

    // Requests accepted before a graceful close keep running until the
    // connection itself is gone; dropping the guard then cancels them.
    let reason = quic.closed().await;
    tracing::debug!(reason = %reason, "Connection finished");
    drop(guard);
    Ok(())
}
