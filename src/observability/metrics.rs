//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): by method, status, outcome
//! - `gateway_request_duration_seconds` (histogram): by method, outcome
//! - `gateway_active_connections` (gauge): current QUIC connection count
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome,
    )
    .increment(1);

    metrics::histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "outcome" => outcome,
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("gateway_active_connections").set(count as f64);
}
