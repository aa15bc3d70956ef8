//! Error types for stream assembly.
//!
//! Every failure observed while assembling a streamed response is funneled into
//! [`StreamError`] and reported through `StreamingResponseHandler::on_error`.
//! Nothing here is retried; retries belong to the vendor client.

use std::time::Duration;
use thiserror::Error;

/// Why a block-level event was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A delta or stop referenced an index that was never started.
    UnknownBlock,
    /// A delta or stop referenced an index that is already closed.
    BlockClosed,
    /// `BlockStart` for an index that is currently open.
    AlreadyOpen,
    /// `BlockStart` for an index that was already closed; indices are never reused.
    IndexReused,
    /// The delta kind does not match the kind the block was started with.
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// The block buffer grew past the configured limit.
    BufferOverflow { limit: usize },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownBlock => write!(f, "no block was started at this index"),
            Self::BlockClosed => write!(f, "block is already closed"),
            Self::AlreadyOpen => write!(f, "block is already open"),
            Self::IndexReused => write!(f, "index was already used by a closed block"),
            Self::KindMismatch { expected, found } => {
                write!(f, "{found} delta sent to a {expected} block")
            }
            Self::BufferOverflow { limit } => {
                write!(f, "block buffer exceeds {limit} bytes")
            }
        }
    }
}

/// Unified error for a single streamed request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The vendor stream referenced an unknown, closed or mismatched block.
    #[error("Protocol violation at block {index}: {reason}")]
    ProtocolViolation { index: usize, reason: Violation },

    /// Assembly was attempted while blocks were still open.
    #[error("Incomplete stream: blocks {open_indices:?} still open at assembly")]
    IncompleteStream { open_indices: Vec<usize> },

    /// Opaque failure from the vendor transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No event arrived within the idle timeout.
    #[error("No stream event within {0:?}")]
    Timeout(Duration),

    /// The caller abandoned the request.
    #[error("Stream cancelled")]
    Cancelled,

    /// A vendor wire chunk could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The inbound stream finished without `MessageStop` or an error.
    #[error("Stream ended before a terminal event")]
    StreamEnded,
}

impl StreamError {
    pub fn violation(index: usize, reason: Violation) -> Self {
        Self::ProtocolViolation { index, reason }
    }

    /// Wrap any transport-layer error, keeping its message untouched.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Whether the failure was caused by the vendor sending an invalid stream.
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation { .. } | Self::IncompleteStream { .. }
        )
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid idle timeout: must be greater than zero")]
    InvalidTimeout,

    #[error("Invalid buffer limit: must be greater than zero")]
    InvalidBufferLimit,

    #[error("Invalid configuration JSON: {0}")]
    Json(String),

    #[error("Maximum {max} cache points allowed per request, but got {count}")]
    TooManyCachePoints { count: usize, max: usize },

    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type for stream assembly operations
pub type Result<T> = std::result::Result<T, StreamError>;
