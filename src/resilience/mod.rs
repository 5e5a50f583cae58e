//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives (arrival instant recorded)
//!     → timeouts.rs (deadline = arrival + forward budget)
//!     → upstream call raced against deadline and client disconnect
//!     → loser dropped, resources released
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - Single attempt: no retries, no circuit breaking

pub mod timeouts;

pub use timeouts::{ForwardDeadline, Interrupted};
