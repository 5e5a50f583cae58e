//! TLS-over-TCP listener (HTTP/1.1 and HTTP/2).
//!
//! Clients that have not discovered HTTP/3 yet reach the same gateway core
//! here. Every response carries an `Alt-Svc` header pointing at the HTTP/3
//! endpoint; apart from that header, responses are relayed exactly as on the
//! HTTP/3 path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::ALT_SVC, HeaderValue, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

use crate::http::body;
use crate::http::gateway::Gateway;
use crate::http::request::InboundRequest;
use crate::http::response::{self, failure_head};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Handler state for the TCP listener.
#[derive(Clone)]
struct TcpState {
    gateway: Arc<Gateway>,
    alt_svc: HeaderValue,
}

/// `Alt-Svc` value advertising HTTP/3 on `port`.
pub fn alt_svc_value(port: u16) -> HeaderValue {
    HeaderValue::from_str(&format!("h3=\":{port}\"; ma=86400"))
        .unwrap_or_else(|_| HeaderValue::from_static("clear"))
}

/// Build the router serving every method and path through the gateway.
pub fn build_router(gateway: Arc<Gateway>, h3_port: u16) -> Router {
    let state = TcpState {
        gateway,
        alt_svc: alt_svc_value(h3_port),
    };

    Router::new()
        .route("/", any(gateway_handler))
        .route("/{*path}", any(gateway_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn gateway_handler(State(state): State<TcpState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let inbound = InboundRequest::from_http(request.map(body::boxed));
    let method = inbound.method.clone();

    // The body streams after the handler returns, so the outcome is recorded
    // once the head is known.
    let mut response = match state.gateway.forward(inbound, None).await {
        Ok(upstream) => {
            metrics::record_request(method.as_str(), upstream.status.as_u16(), "ok", start);
            response::into_axum_response(upstream)
        }
        Err(e) => {
            metrics::record_request(method.as_str(), 500, e.kind(), start);
            let (parts, ()) = failure_head().into_parts();
            Response::from_parts(parts, Body::empty())
        }
    };

    response.headers_mut().insert(ALT_SVC, state.alt_svc.clone());
    response
}

/// Serve the router over TLS on an already-bound listener until `shutdown` fires.
pub async fn serve(
    listener: std::net::TcpListener,
    tls: axum_server::tls_rustls::RustlsConfig,
    router: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.recv().await;
        shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
    });

    tracing::info!(address = %addr, "TCP listener starting");
    axum_server::from_tcp_rustls(listener, tls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    tracing::info!("TCP listener stopped");
    Ok(())
}
