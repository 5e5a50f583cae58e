//! HTTP/3 → HTTP/1.1 gateway library.
//!
//! Terminates HTTP/3 (QUIC) connections and forwards every request, once and
//! under a deadline, to a single HTTP/1.1 upstream, relaying the response back.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
