//! HTTP/3 → HTTP/1.1 gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  H3 GATEWAY                      │
//!   HTTP/3 client         │  ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//!   ──────────────────────┼─▶│   net    │──▶│  request   │──▶│   client   │──┼──▶ HTTP/1.1
//!                         │  │ QUIC/TLS │   │ translator │   │ (deadline) │  │    upstream
//!                         │  └──────────┘   └────────────┘   └─────┬──────┘  │
//!                         │                                        │         │
//!   ◀─────────────────────┼────────────────── response relay ◀─────┘         │
//!                         │                                                  │
//!                         │  config · observability · lifecycle              │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use h3_gateway::config::{loader, ConfigOverrides, UpstreamScheme};
use h3_gateway::lifecycle::startup;
use h3_gateway::observability::logging;

/// HTTP/3 to HTTP/1.1 gateway for a single upstream.
#[derive(Parser, Debug)]
#[command(name = "h3-gateway", version, about)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP address for the HTTP/3 listener
    #[arg(long)]
    listen: Option<String>,

    /// TCP address for the TLS HTTP/1.1 + HTTP/2 listener
    #[arg(long)]
    tcp_listen: Option<String>,

    /// Upstream host[:port]
    #[arg(long)]
    upstream: Option<String>,

    /// Scheme used to reach the upstream
    #[arg(long)]
    scheme: Option<UpstreamScheme>,

    /// Skip upstream certificate validation (true/false)
    #[arg(long)]
    insecure_skip_verify: Option<bool>,

    /// TLS server identity name
    #[arg(long)]
    server_name: Option<String>,

    /// TLS certificate (PEM)
    #[arg(long)]
    cert: Option<String>,

    /// TLS private key (PEM)
    #[arg(long)]
    key: Option<String>,

    /// Forwarding deadline in milliseconds
    #[arg(long)]
    forward_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            tcp_listen: self.tcp_listen.clone(),
            upstream: self.upstream.clone(),
            scheme: self.scheme,
            insecure_skip_verify: self.insecure_skip_verify,
            server_name: self.server_name.clone(),
            cert_path: self.cert.clone(),
            key_path: self.key.clone(),
            forward_timeout_ms: self.forward_timeout_ms,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = loader::load_with_overrides(cli.config.as_deref(), &cli.overrides())?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listener.bind_address,
        upstream = %config.upstream.address,
        "h3-gateway starting"
    );

    if let Err(e) = startup::run_until_signal(config).await {
        tracing::error!(error = %e, "Fatal startup error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
