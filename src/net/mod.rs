//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming QUIC connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (rustls config, ALPN h3)
//!     → connection.rs (ids, tracking, disconnect signal)
//!     → Hand off to HTTP/3 layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked; its end cancels in-flight forwards
//! - TLS material is loaded once at startup; failure is fatal

pub mod connection;
pub mod listener;
pub mod tls;
