//! Error types for the entropy coding layer.
//!
//! This module provides a single structured error type covering every failure
//! mode the entropy core can produce: out-of-range construction parameters,
//! inconsistent header fields, Huffman codes that overflow their length
//! budget, and premature end of the underlying byte stream.

use std::io;
use thiserror::Error;

/// The error type shared by every coder in the entropy layer.
#[derive(Debug, Error)]
pub enum EntropyError {
    /// I/O error from the underlying byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An out-of-range parameter was supplied at construction (logRange,
    /// chunkSize, order, ...).
    #[error("invalid argument: {name} = {value} (expected {expected})")]
    InvalidArgument {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was supplied.
        value: i64,
        /// Human-readable description of the valid range.
        expected: &'static str,
    },

    /// A header field failed an internal consistency check (alphabet size,
    /// decoded frequency, code length, ...).
    #[error("invalid stream at bit offset {offset}: {message}")]
    InvalidStream {
        /// Bit offset at which the inconsistency was detected.
        offset: u64,
        /// Description of the inconsistency.
        message: String,
    },

    /// Canonical Huffman code-length assignment would exceed the maximum
    /// representable length.
    #[error("limit exceeded: {what} = {actual}, limit = {limit}")]
    LimitExceeded {
        /// What quantity exceeded its limit.
        what: &'static str,
        /// The limit that was exceeded.
        limit: u32,
        /// The value that would have been required.
        actual: u32,
    },

    /// The underlying byte source was exhausted mid-symbol.
    #[error("end of stream: {requested} more bit(s) requested, none available")]
    EndOfStream {
        /// Number of bits that were requested but unavailable.
        requested: u32,
    },
}

/// Result type alias for entropy coding operations.
pub type Result<T> = std::result::Result<T, EntropyError>;

impl EntropyError {
    /// Create an invalid argument error.
    pub fn invalid_argument(name: &'static str, value: i64, expected: &'static str) -> Self {
        Self::InvalidArgument {
            name,
            value,
            expected,
        }
    }

    /// Create an invalid stream error.
    pub fn invalid_stream(offset: u64, message: impl Into<String>) -> Self {
        Self::InvalidStream {
            offset,
            message: message.into(),
        }
    }

    /// Create a limit-exceeded error.
    pub fn limit_exceeded(what: &'static str, limit: u32, actual: u32) -> Self {
        Self::LimitExceeded {
            what,
            limit,
            actual,
        }
    }

    /// Create an end-of-stream error.
    pub fn end_of_stream(requested: u32) -> Self {
        Self::EndOfStream { requested }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EntropyError::invalid_argument("logRange", 20, "[8,16]");
        assert!(err.to_string().contains("logRange"));

        let err = EntropyError::limit_exceeded("huffman code length", 24, 25);
        assert!(err.to_string().contains("limit exceeded"));

        let err = EntropyError::end_of_stream(12);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err: EntropyError = io_err.into();
        assert!(matches!(err, EntropyError::Io(_)));
    }
}
