//! This module defines the single, unified error type for the entire blockpress
//! library. It uses the `thiserror` crate to provide ergonomic, context-aware
//! error handling.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Error, Debug)]
pub enum CodecError {
    // =========================================================================
    // === Caller Contract Errors
    // =========================================================================
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("offset {offset} + length {length} out of range for buffer of {extent} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        extent: usize,
    },

    /// The engine's codec context has been destroyed (or was never created).
    /// Every native call is guarded by this check.
    #[error("codec context is not initialized")]
    NotInitialized,

    /// An operation was issued against a stream that is already closed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    // =========================================================================
    // === Stream & Codec Errors
    // =========================================================================
    /// The framed input ended somewhere other than a frame boundary, or a
    /// frame failed to decode. Distinct from clean end-of-stream.
    #[error("corrupt block stream: {0}")]
    CorruptStream(String),

    /// The requested codec could not be bound. Surfaced at first use rather
    /// than silently substituting another codec.
    #[error("codec '{codec}' is unavailable: {reason}")]
    CodecUnavailable { codec: String, reason: String },

    /// A bound codec call failed. These are deterministic, CPU-bound
    /// failures; retrying would not change the outcome.
    #[error("codec operation failed: {0}")]
    Codec(String),

    /// An error originating from the underlying I/O transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supports the `std::io::Read`/`Write` impls on the framing streams.
impl From<CodecError> for std::io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(inner) => inner,
            CodecError::CorruptStream(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
            }
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        }
    }
}
