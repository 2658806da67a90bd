//! The closed failure taxonomy for one capture attempt.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The capture step a timeout fired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    Handshake,
    Request,
    Response,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Connect => "connect",
            Step::Handshake => "handshake",
            Step::Request => "update request",
            Step::Response => "response wait",
        };
        f.write_str(name)
    }
}

/// Why a capture attempt produced no frame.
///
/// Every variant is per-host and non-fatal to a scan: the orchestrator
/// logs the outcome and moves on. Nothing here is retried.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The transport could not be opened (refused, unreachable, DNS).
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Protocol negotiation failed: version mismatch, authentication
    /// required, or the peer hung up mid-handshake.
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The framebuffer update request could not be sent.
    #[error("update request failed: {0}")]
    Request(#[source] std::io::Error),

    /// A step's timer elapsed before the peer answered.
    #[error("{step} timed out after {budget:?}")]
    Timeout { step: Step, budget: Duration },

    /// The update arrived but could not be turned into an image:
    /// unsupported encoding, malformed rectangle data, or a broken
    /// stream while the update was being read.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl CaptureError {
    /// Stable one-word kind for log lines and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Connect(_) => "connect",
            CaptureError::Handshake(_) => "handshake",
            CaptureError::Request(_) => "request",
            CaptureError::Timeout { .. } => "timeout",
            CaptureError::Decode(_) => "decode",
        }
    }
}
