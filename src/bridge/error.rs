//! Bridge-specific error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur on the bridge transport.
///
/// Every variant is fatal for the session: the protocol correlates
/// requests and responses by order alone, so once a round trip fails the
/// stream pair can no longer be trusted.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The stream closed before a complete frame was read.
    #[error("stream closed mid-frame: expected {expected} bytes, received {received}")]
    TruncatedStream {
        /// Bytes the frame header announced (or the header bytes still missing).
        expected: usize,
        /// Bytes actually received before end of stream.
        received: usize,
    },

    /// Writing a request to the parent failed (usually a broken pipe).
    #[error("bridge unavailable: {0}")]
    BridgeUnavailable(#[source] io::Error),

    /// Reading a response from the parent failed.
    #[error("failed to read from bridge: {0}")]
    ReadFailed(#[source] io::Error),

    /// The parent did not answer within the configured bound.
    #[error("bridge request timed out after {0:?}")]
    Timeout(Duration),

    /// A response frame did not follow the wire format.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A path cannot be carried in a request line.
    #[error("path cannot be sent over the bridge: {0:?}")]
    InvalidPath(String),

    /// An earlier transport failure left the session unusable.
    #[error("bridge session is unusable after an earlier transport failure")]
    Poisoned,
}

impl BridgeError {
    /// Create a truncated stream error.
    pub fn truncated(expected: usize, received: usize) -> Self {
        Self::TruncatedStream { expected, received }
    }

    /// Create a malformed frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame(message.into())
    }

    /// Check if this error means the parent went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. } | Self::BridgeUnavailable(_) | Self::Poisoned
        )
    }

    /// Turn a read that hit the deadline into a [`BridgeError::Timeout`].
    pub(crate) fn with_deadline(self, timeout: Option<Duration>) -> Self {
        match (self, timeout) {
            (Self::ReadFailed(err), Some(limit)) if err.kind() == io::ErrorKind::TimedOut => {
                Self::Timeout(limit)
            }
            (other, _) => other,
        }
    }
}
