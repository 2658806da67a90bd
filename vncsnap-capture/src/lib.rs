//! Bounded-time single-frame capture engine.
//!
//! Given a host address, [`capture`] opens a TCP connection, negotiates an
//! RFB session (security type None, shared access), requests exactly one
//! full framebuffer update, and decodes the raw-encoded response into a
//! [`FrameGrid`]. Every step races an explicit timer from the
//! [`StepBudget`], so an unresponsive or malicious peer bounds the task's
//! total lifetime instead of stalling it; on any exit path the connection
//! is released by drop.
//!
//! The engine is self-contained: it holds no shared state, performs no
//! retries, and writes no files. Callers own fan-out, persistence and
//! result logging.

pub mod engine;
pub mod error;
pub mod frame;

pub use engine::{capture, StepBudget};
pub use error::{CaptureError, Step};
pub use frame::{FrameGrid, Rgb};

use std::fmt;

/// A transport endpoint to capture from. Immutable, supplied by the
/// discovery collaborator, one per capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress {
    pub ip: String,
    pub port: u16,
}

impl HostAddress {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
