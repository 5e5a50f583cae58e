//! Forwarding deadline enforcement.
//!
//! # Responsibilities
//! - Bound the upstream call by an absolute deadline fixed at request arrival
//! - Abort the call when the client connection goes away
//! - Release the timer and the in-flight call on every exit path
//!
//! # Design Decisions
//! - Cancellation, not a post-hoc check: the losing future is dropped, which
//!   tears down the upstream exchange
//! - `ForwardDeadline` is consumed by `run`, so nothing outlives the call
//! - A future that is ready at the deadline wins over the timer

use std::future::{pending, Future};
use std::time::Duration;

use tokio::time::Instant;

use crate::net::connection::DisconnectSignal;

/// Why a forwarded call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("forwarding deadline exceeded")]
    DeadlineExceeded,
    #[error("client disconnected")]
    ClientDisconnected,
}

/// Per-request cancellation scope.
#[derive(Debug)]
pub struct ForwardDeadline {
    deadline: Instant,
    disconnect: Option<DisconnectSignal>,
}

impl ForwardDeadline {
    pub fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            disconnect: None,
        }
    }

    /// Also abort when `signal` fires.
    pub fn with_disconnect(mut self, signal: Option<DisconnectSignal>) -> Self {
        self.disconnect = signal;
        self
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Drive `call` until it completes, the deadline passes, or the client leaves.
    pub async fn run<F: Future>(self, call: F) -> Result<F::Output, Interrupted> {
        let Self {
            deadline,
            disconnect,
        } = self;

        tokio::select! {
            biased;
            output = call => Ok(output),
            _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
            _ = wait_for_disconnect(disconnect) => Err(Interrupted::ClientDisconnected),
        }
    }
}

async fn wait_for_disconnect(signal: Option<DisconnectSignal>) {
    match signal {
        Some(mut signal) => signal.disconnected().await,
        None => pending().await,
    }
}
