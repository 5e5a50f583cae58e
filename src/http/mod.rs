//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP/3 request stream (server.rs)   or   TLS/TCP request (tcp.rs)
//!     → request.rs  (InboundRequest → OutboundRequest, headers.rs flattening)
//!     → client.rs   (single dispatch to the upstream under the forwarding deadline)
//!     → response.rs (status + flattened headers + streamed body back to the client)
//! ```
//!
//! gateway.rs strings the three steps together for one request.

pub mod body;
pub mod client;
pub mod gateway;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod tcp;

pub use gateway::Gateway;
pub use server::HttpServer;
