//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse, merge overrides, deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → fields handed to each component at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - Everything except the upstream has a default
//! - The upstream trust bypass must be stated explicitly
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigOverrides};
pub use schema::{
    GatewayConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig, TlsConfig, UpstreamConfig,
    UpstreamScheme,
};
