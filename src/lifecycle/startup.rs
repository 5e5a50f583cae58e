//! Startup orchestration.
//!
//! # Responsibilities
//! - Load TLS material and build listener configs
//! - Build the gateway core (translator + upstream client)
//! - Bind listeners, start the metrics endpoint, run until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and surfaces as a non-zero exit
//! - Listeners bind last, after everything they depend on is ready
//! - Per-request errors never reach this layer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::http::gateway::{Gateway, GatewayBuildError};
use crate::http::{tcp, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::listener::{ListenerError, QuicListener};
use crate::net::tls::{self, TlsError};
use crate::observability::metrics;

/// Fatal error raised before the gateway starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("tls: {0}")]
    Tls(#[from] TlsError),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayBuildError),
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
    #[error("tcp listener {address}: {source}")]
    TcpBind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("server: {0}")]
    Server(#[from] std::io::Error),
}

/// Bind everything described by `config` and serve until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let material = tls::load_material(&config.tls)?;
    tls::verify_server_name(&material, &config.tls.server_name)?;
    let idle_timeout = Duration::from_secs(config.timeouts.idle_secs);
    let quic_config = tls::quic_server_config(&material, idle_timeout)?;

    let gateway = Arc::new(Gateway::new(&config)?);
    tracing::info!(
        upstream = %config.upstream.address,
        scheme = %config.upstream.scheme,
        forward_timeout_ms = config.timeouts.forward_ms,
        server_name = %config.tls.server_name,
        "Gateway configured"
    );

    let quic = QuicListener::bind(
        &config.listener.bind_address,
        quic_config,
        config.listener.max_connections,
    )?;
    let h3_port = quic.local_addr()?.port();

    let tcp_task = match &config.listener.tcp_bind_address {
        Some(address) => {
            let listener = std::net::TcpListener::bind(address).map_err(|source| {
                StartupError::TcpBind {
                    address: address.clone(),
                    source,
                }
            })?;
            let router = tcp::build_router(Arc::clone(&gateway), h3_port);
            let tls_config = tls::tcp_server_config(&material)?;
            Some(tokio::spawn(tcp::serve(
                listener,
                tls_config,
                router,
                shutdown.subscribe(),
            )))
        }
        None => None,
    };

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(gateway);
    server.run(quic, shutdown.subscribe()).await?;

    if let Some(task) = tcp_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "TCP listener failed"),
            Err(e) => tracing::error!(error = %e, "TCP listener task panicked"),
        }
    }

    Ok(())
}

/// Run with OS signal handling: SIGINT/SIGTERM trigger graceful shutdown.
pub async fn run_until_signal(config: GatewayConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        tracing::info!("Shutdown signal received, draining");
        trigger.trigger();
    });

    run(config, shutdown).await
}
