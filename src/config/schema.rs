//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// HTTP/3 listener configuration.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// TLS identity presented to inbound clients.
    #[serde(default)]
    pub tls: TlsConfig,

    /// The single legacy upstream every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Build a configuration for `upstream` with every other section defaulted.
    pub fn for_upstream(upstream: UpstreamConfig) -> Self {
        Self {
            listener: ListenerConfig::default(),
            tls: TlsConfig::default(),
            upstream,
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// UDP bind address for HTTP/3 (e.g., "0.0.0.0:4433").
    pub bind_address: String,

    /// Maximum concurrent QUIC connections (backpressure).
    pub max_connections: usize,

    /// Optional TCP bind address for the TLS HTTP/1.1 + HTTP/2 listener.
    /// Responses on this listener advertise the HTTP/3 endpoint via `Alt-Svc`.
    pub tcp_bind_address: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            max_connections: 10_000,
            tcp_bind_address: None,
        }
    }
}

/// TLS configuration for the listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Server identity name; must be covered by the certificate.
    pub server_name: String,

    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
        }
    }
}

/// Scheme used to reach the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamScheme {
    Http,
    Https,
}

impl UpstreamScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamScheme::Http => "http",
            UpstreamScheme::Https => "https",
        }
    }
}

impl std::fmt::Display for UpstreamScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UpstreamScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(UpstreamScheme::Http),
            "https" => Ok(UpstreamScheme::Https),
            other => Err(format!("unsupported scheme {other:?}, expected http or https")),
        }
    }
}

/// Upstream (legacy HTTP/1.1) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream authority (e.g., "127.0.0.1:8080" or "backend.internal:443").
    pub address: String,

    /// Scheme used for the outbound request.
    #[serde(default = "default_scheme")]
    pub scheme: UpstreamScheme,

    /// Accept any certificate the upstream presents.
    ///
    /// This is a trust decision, only appropriate when the upstream sits on a
    /// trusted private network. It has no default in config files.
    pub insecure_skip_verify: bool,
}

fn default_scheme() -> UpstreamScheme {
    UpstreamScheme::Http
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Forwarding deadline in milliseconds, measured from request arrival.
    pub forward_ms: u64,

    /// QUIC idle timeout and upstream pool idle timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            forward_ms: 500,
            idle_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_parses_case_insensitively() {
        assert_eq!("HTTPS".parse::<UpstreamScheme>().unwrap(), UpstreamScheme::Https);
        assert_eq!("http".parse::<UpstreamScheme>().unwrap(), UpstreamScheme::Http);
        assert!("ftp".parse::<UpstreamScheme>().is_err());
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            address = "127.0.0.1:8080"
            insecure_skip_verify = false
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.scheme, UpstreamScheme::Http);
        assert_eq!(config.timeouts.forward_ms, 500);
        assert_eq!(config.listener.bind_address, "0.0.0.0:4433");
        assert!(config.listener.tcp_bind_address.is_none());
    }

    #[test]
    fn trust_decision_must_be_explicit() {
        let result: Result<GatewayConfig, _> = toml::from_str(
            r#"
            [upstream]
            address = "127.0.0.1:8080"
            "#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("insecure_skip_verify"), "{err}");
    }
}
