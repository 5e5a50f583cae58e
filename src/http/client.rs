//! Upstream HTTP/1.1 client.
//!
//! # Responsibilities
//! - Deliver each outbound request to the upstream exactly once
//! - Enforce the forwarding deadline by cancellation
//! - Classify failures for logging; the client sees one generic error
//!
//! # Design Decisions
//! - One shared hyper-util pool, owned by the client, no per-request setup
//! - HTTP/1.1 only; `https` upstreams use rustls with the `ring` provider
//! - Certificate validation can be bypassed, but only through the explicit
//!   `upstream.insecure_skip_verify` setting
//! - Response bodies are handed back as streams, never buffered

use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::config::UpstreamConfig;
use crate::http::body::GatewayBody;
use crate::http::request::OutboundRequest;
use crate::http::response::UpstreamResponse;
use crate::net::connection::DisconnectSignal;
use crate::resilience::{ForwardDeadline, Interrupted};

/// Failure to obtain a response from the upstream.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Could not establish a connection (refused, unreachable, TLS handshake).
    #[error("connection to upstream failed: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),
    #[error("forwarding deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("client disconnected before upstream responded")]
    ClientDisconnected,
    /// Any other I/O or protocol failure while exchanging the request.
    #[error("upstream request failed: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),
}

impl UpstreamError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Connect(_) => "connect",
            UpstreamError::DeadlineExceeded(_) => "deadline",
            UpstreamError::ClientDisconnected => "client_disconnected",
            UpstreamError::Transport(_) => "transport",
        }
    }

    fn classify(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            UpstreamError::Connect(err)
        } else {
            UpstreamError::Transport(err)
        }
    }
}

/// Error building the upstream client's TLS stack.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("cannot load native root certificates: {0}")]
    NativeRoots(#[source] std::io::Error),
    #[error("tls configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Client for the single configured upstream.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Client<HttpsConnector<HttpConnector>, GatewayBody>,
    insecure_skip_verify: bool,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, idle_timeout: Duration) -> Result<Self, ClientBuildError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);

        let builder = hyper_rustls::HttpsConnectorBuilder::new();
        let connector = if upstream.insecure_skip_verify {
            tracing::warn!(
                upstream = %upstream.address,
                "Upstream certificate validation is DISABLED (upstream.insecure_skip_verify = true)"
            );
            let tls = ClientConfig::builder_with_provider(provider.clone())
                .with_safe_default_protocol_versions()?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new(&provider)))
                .with_no_client_auth();
            builder
                .with_tls_config(tls)
                .https_or_http()
                .enable_http1()
                .wrap_connector(http)
        } else {
            builder
                .with_provider_and_native_roots(provider)
                .map_err(ClientBuildError::NativeRoots)?
                .https_or_http()
                .enable_http1()
                .wrap_connector(http)
        };

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle_timeout)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Ok(Self {
            inner,
            insecure_skip_verify: upstream.insecure_skip_verify,
        })
    }

    pub fn skips_certificate_validation(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Send `request` once, bounded by its deadline and the client's connection.
    ///
    /// When the deadline passes or the client disconnects, the in-flight
    /// exchange is dropped, which closes the upstream connection.
    pub async fn dispatch(
        &self,
        request: OutboundRequest,
        disconnect: Option<DisconnectSignal>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let (request, deadline) = request.into_http();
        let scope = ForwardDeadline::new(deadline).with_disconnect(disconnect);
        let budget = scope.remaining();

        match scope.run(self.inner.request(request)).await {
            Ok(Ok(response)) => Ok(UpstreamResponse::from_http(response)),
            Ok(Err(e)) => Err(UpstreamError::classify(e)),
            Err(Interrupted::DeadlineExceeded) => Err(UpstreamError::DeadlineExceeded(budget)),
            Err(Interrupted::ClientDisconnected) => Err(UpstreamError::ClientDisconnected),
        }
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish_non_exhaustive()
    }
}

/// Accepts whatever certificate the upstream presents.
///
/// Handshake signatures are still checked against the presented key; only the
/// chain of trust and the name are not.
#[derive(Debug)]
struct SkipServerVerification {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SkipServerVerification {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
