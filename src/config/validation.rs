//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse before any socket is bound
//! - Validate value ranges (deadline > 0, connection limit > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::Authority;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending key (e.g. `timeouts.forward_ms`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new("listener.bind_address", e.to_string()));
    }
    if let Some(tcp) = &config.listener.tcp_bind_address {
        if let Err(e) = tcp.parse::<SocketAddr>() {
            errors.push(ValidationError::new("listener.tcp_bind_address", e.to_string()));
        }
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.tls.server_name.trim().is_empty() {
        errors.push(ValidationError::new("tls.server_name", "must not be empty"));
    }
    if config.tls.cert_path.trim().is_empty() {
        errors.push(ValidationError::new("tls.cert_path", "must not be empty"));
    }
    if config.tls.key_path.trim().is_empty() {
        errors.push(ValidationError::new("tls.key_path", "must not be empty"));
    }

    let upstream = config.upstream.address.trim();
    if upstream.is_empty() {
        errors.push(ValidationError::new("upstream.address", "must not be empty"));
    } else if upstream.contains('/') {
        errors.push(ValidationError::new(
            "upstream.address",
            "expected host[:port] without scheme or path",
        ));
    } else if let Err(e) = upstream.parse::<Authority>() {
        errors.push(ValidationError::new("upstream.address", e.to_string()));
    }

    if config.timeouts.forward_ms == 0 {
        errors.push(ValidationError::new("timeouts.forward_ms", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new("observability.metrics_address", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{UpstreamConfig, UpstreamScheme};

    fn valid() -> GatewayConfig {
        GatewayConfig::for_upstream(UpstreamConfig {
            address: "127.0.0.1:8080".into(),
            scheme: UpstreamScheme::Http,
            insecure_skip_verify: true,
        })
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.listener.bind_address = "not-an-addr".into();
        config.timeouts.forward_ms = 0;
        config.upstream.address = "http://backend/api".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "upstream.address", "timeouts.forward_ms"]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn hostname_upstream_is_accepted() {
        let mut config = valid();
        config.upstream.address = "backend.internal:8443".into();
        assert!(validate_config(&config).is_ok());
    }
}
