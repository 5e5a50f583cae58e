//! Per-request orchestration: translate → dispatch → relay.
//!
//! Within a request the order is strict: translation completes before
//! dispatch, and dispatch completes (or fails) before relay begins. Requests
//! share nothing but the read-only translator and the upstream pool.

use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::http::client::{ClientBuildError, UpstreamClient, UpstreamError};
use crate::http::request::{InboundRequest, RequestTranslator};
use crate::http::response::{self, RelayError, ResponseSink, UpstreamResponse};
use crate::net::connection::DisconnectSignal;
use crate::observability::metrics;

/// Error constructing a [`Gateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayBuildError {
    #[error("invalid upstream address: {0}")]
    Upstream(#[from] axum::http::uri::InvalidUri),
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

/// Why a request could not be forwarded.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("cannot compose upstream target: {0}")]
    InvalidTarget(#[from] axum::http::Error),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ForwardError {
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::InvalidTarget(_) => "invalid_target",
            ForwardError::Upstream(e) => e.kind(),
        }
    }
}

/// The translation-and-relay core, shared by every listener.
#[derive(Debug, Clone)]
pub struct Gateway {
    translator: RequestTranslator,
    client: UpstreamClient,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayBuildError> {
        let forward_timeout = Duration::from_millis(config.timeouts.forward_ms);
        let idle_timeout = Duration::from_secs(config.timeouts.idle_secs);

        Ok(Self::from_parts(
            RequestTranslator::new(&config.upstream, forward_timeout)?,
            UpstreamClient::new(&config.upstream, idle_timeout)?,
        ))
    }

    pub fn from_parts(translator: RequestTranslator, client: UpstreamClient) -> Self {
        Self { translator, client }
    }

    /// Translate `inbound` and dispatch it once to the upstream.
    ///
    /// Failures are logged here, exactly once per request.
    pub async fn forward(
        &self,
        inbound: InboundRequest,
        disconnect: Option<DisconnectSignal>,
    ) -> Result<UpstreamResponse, ForwardError> {
        let result = match self.translator.translate(inbound) {
            Ok(outbound) => {
                tracing::debug!(target_uri = %outbound.uri, "Dispatching to upstream");
                self.client
                    .dispatch(outbound, disconnect)
                    .await
                    .map_err(ForwardError::from)
            }
            Err(e) => Err(ForwardError::from(e)),
        };

        match &result {
            Ok(response) => {
                tracing::debug!(status = %response.status, "Upstream responded");
            }
            Err(ForwardError::Upstream(UpstreamError::ClientDisconnected)) => {
                tracing::info!(kind = "client_disconnected", "Upstream dispatch abandoned");
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "upstream dispatch failed");
            }
        }

        result
    }

    /// Handle one request end to end, writing the outcome to `sink`.
    pub async fn handle<S: ResponseSink>(
        &self,
        inbound: InboundRequest,
        sink: &mut S,
        disconnect: Option<DisconnectSignal>,
    ) {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %inbound.method,
            path = %inbound.path,
        );

        async move {
            let start = Instant::now();
            let method = inbound.method.clone();

            let response = match self.forward(inbound, disconnect.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    response::send_failure(sink).await;
                    metrics::record_request(method.as_str(), 500, e.kind(), start);
                    return;
                }
            };

            let status = response.status.as_u16();
            match relay_until_disconnect(response, sink, disconnect).await {
                Ok(bytes) => {
                    tracing::debug!(status, bytes, "Response relayed");
                    metrics::record_request(method.as_str(), status, "ok", start);
                }
                Err(e) => {
                    tracing::warn!(
                        status,
                        committed = e.is_committed(),
                        error = %e,
                        "response relay aborted"
                    );
                    metrics::record_request(method.as_str(), status, "relay_aborted", start);
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Relay `response`, abandoning it when the client connection closes.
///
/// Dropping the relay drops the upstream body, which closes the upstream
/// connection instead of returning it to the pool.
async fn relay_until_disconnect<S: ResponseSink>(
    response: UpstreamResponse,
    sink: &mut S,
    disconnect: Option<DisconnectSignal>,
) -> Result<u64, RelayError> {
    let Some(mut signal) = disconnect else {
        return response::relay(response, sink).await;
    };

    tokio::select! {
        biased;
        result = response::relay(response, sink) => result,
        _ = signal.disconnected() => Err(RelayError::ClientDisconnected),
    }
}
