//! Error types for OxiBlock operations.
//!
//! This module provides the error type shared by every transform and
//! entropy coder in the workspace. Two variants are *recoverable*
//! signals rather than failures: [`OxiBlockError::NoCompression`]
//! (the coded form would be at least as large as the input) and
//! [`OxiBlockError::SkipBlock`] (a transform declined the block).
//! The framing layer is expected to store such blocks raw.

use std::io;
use thiserror::Error;

/// The main error type for OxiBlock operations.
#[derive(Debug, Error)]
pub enum OxiBlockError {
    /// I/O error from the underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid input buffer (empty where not allowed, length out of bounds).
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input.
        message: String,
    },

    /// Malformed compressed stream detected during decode.
    #[error("Invalid bitstream: {message}")]
    InvalidBitstream {
        /// Description of the corruption.
        message: String,
    },

    /// Destination slice shorter than the operation requires.
    #[error("Output too small: need {needed} bytes, have {available}")]
    OutputTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// Encoded size would be at least the uncompressed size.
    ///
    /// Recoverable: the caller should store the block raw.
    #[error("No compression achieved ({encoded} >= {original} bytes)")]
    NoCompression {
        /// Size the encoder produced (or would produce).
        encoded: usize,
        /// Original block size.
        original: usize,
    },

    /// The transform declined this block (e.g. too small to be useful).
    ///
    /// Recoverable: the block passes through unchanged.
    #[error("Block skipped: {reason}")]
    SkipBlock {
        /// Why the transform declined.
        reason: String,
    },
}

/// Result type alias for OxiBlock operations.
pub type Result<T> = std::result::Result<T, OxiBlockError>;

impl OxiBlockError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid bitstream error.
    pub fn invalid_bitstream(message: impl Into<String>) -> Self {
        Self::InvalidBitstream {
            message: message.into(),
        }
    }

    /// Create an output too small error.
    pub fn output_too_small(needed: usize, available: usize) -> Self {
        Self::OutputTooSmall { needed, available }
    }

    /// Create a no-compression signal.
    pub fn no_compression(encoded: usize, original: usize) -> Self {
        Self::NoCompression { encoded, original }
    }

    /// Create a skip-block signal.
    pub fn skip_block(reason: impl Into<String>) -> Self {
        Self::SkipBlock {
            reason: reason.into(),
        }
    }

    /// Whether the framing layer can recover by storing the block raw.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoCompression { .. } | Self::SkipBlock { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiBlockError::invalid_bitstream("frequency sum mismatch");
        assert!(err.to_string().contains("frequency sum mismatch"));

        let err = OxiBlockError::output_too_small(100, 10);
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_recoverable() {
        assert!(OxiBlockError::no_compression(120, 100).is_recoverable());
        assert!(OxiBlockError::skip_block("block below minimum").is_recoverable());
        assert!(!OxiBlockError::invalid_input("empty").is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: OxiBlockError = io_err.into();
        assert!(matches!(err, OxiBlockError::Io(_)));
    }
}
