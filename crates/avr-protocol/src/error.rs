//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building or checking command frames.
///
/// The display parser never fails: malformed input is skipped, not reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Command payload is not exactly four bytes.
    #[error("command payload must be {expected} bytes, got {actual}")]
    WrongPayloadLength {
        /// Required payload length.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// Encoded frame has the wrong length.
    #[error("command frame must be {expected} bytes, got {actual}")]
    FrameLength {
        /// Required frame length.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// Frame does not start with the expected signature.
    #[error("bad frame signature")]
    BadSignature,

    /// Metadata bytes after the signature are not recognised.
    #[error("bad frame metadata: {0:02X} {1:02X}")]
    BadMetadata(u8, u8),

    /// Checksum does not match the payload.
    #[error("checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum computed from the payload.
        expected: u16,
        /// Checksum carried by the frame.
        actual: u16,
    },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
