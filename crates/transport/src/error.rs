//! Error types for the transport layer.

use std::io;

/// Errors that can occur while encoding or decoding frames.
///
/// Only some of these end a connection: see [`CodecError::is_recoverable`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The declared payload length exceeds the configured maximum.
    #[error("frame size {size} exceeds maximum allowed {max}")]
    FrameTooLarge {
        /// The declared payload size.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },

    /// The payload is not a valid `{jsonrpc, method, params}` object.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Failed to serialize an outgoing message.
    #[error("JSON serialization failed: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}

impl CodecError {
    /// Whether the stream can keep being read after this error.
    ///
    /// A malformed payload was still a complete, checksummed frame, so the
    /// stream position is intact and the next frame can be decoded.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Malformed(_))
    }
}
