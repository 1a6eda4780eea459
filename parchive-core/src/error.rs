//! Error types for packet decoding, verification and stream acquisition.

use std::io;
use thiserror::Error;

/// Result type alias for parchive operations
pub type Result<T> = std::result::Result<T, Error>;

/// A packet header could not be decoded. After one of these the stream position
/// can no longer be trusted, so scans stop instead of guessing a new alignment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("bad packet magic at offset {offset}")]
    BadMagic { offset: u64 },

    #[error("packet at offset {offset} declares length {length}, shorter than the 64-byte header")]
    LengthTooSmall { offset: u64, length: u64 },

    #[error("packet at offset {offset} is truncated: need {expected} bytes, {available} available")]
    Truncated { offset: u64, expected: u64, available: u64 },

    #[error("packet at offset {offset} declares length {length}, above the {limit}-byte limit")]
    TooLarge { offset: u64, length: u64, limit: u64 },
}

/// Main error type for parchive-core
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or truncated packet header
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Body hash mismatch; header fields stay usable, the payload is withheld
    #[error("integrity error: packet at offset {offset}: {reason}")]
    Integrity { offset: u64, reason: String },

    /// Header was fine but the type-specific body does not fit its layout
    #[error("malformed packet at offset {offset}: {reason}")]
    MalformedPacket { offset: u64, reason: String },

    /// A content stream could not be acquired for a location
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The request cannot be carried out in the current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn is_framing(&self) -> bool {
        matches!(self, Error::Framing(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity { .. })
    }

    /// Whether a packet scan can carry on past this error. Integrity and body
    /// errors leave the position known from the packet length; the rest do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Integrity { .. } | Error::MalformedPacket { .. })
    }
}
