//! Error types for reading ZIP archives.
//!
//! Reaching the end of the archive or the end of an entry's data is not an
//! error: those are reported as `Ok(None)` by
//! [`Archive::next_header`](crate::Archive::next_header) and
//! [`EntryReader::next_block`](crate::EntryReader::next_block).

use thiserror::Error;

/// Errors that can occur while scanning or decoding a ZIP archive.
#[derive(Debug, Error)]
pub enum ZipError {
    /// A signature did not match, or a header contradicts itself.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The source ended before a header or an entry's data did.
    #[error("truncated input at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedInput { offset: u64, expected: u64, actual: u64 },

    /// The compressed bitstream is invalid or the CRC-32 does not match.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// The decoded length differs from the entry's declared size.
    #[error("size mismatch: declared {expected} bytes, decoded {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The compression method is unknown or disabled on this handle.
    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    /// The entry uses a ZIP feature this reader does not implement.
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    /// A cursor was advanced beyond the entry's uncompressed size.
    #[error("attempted to read {requested} bytes with only {remaining} remaining")]
    OverRead { requested: u64, remaining: u64 },

    /// The underlying source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZipError {
    /// Whether the error only concerns the current entry's encoding, so a
    /// caller may skip the entry and keep scanning.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ZipError::UnsupportedMethod(_) | ZipError::Unsupported(_))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ZipError::MalformedHeader(message.into())
    }
}

impl From<ZipError> for std::io::Error {
    fn from(err: ZipError) -> Self {
        use std::io::ErrorKind;

        let kind = match err {
            ZipError::Io(e) => return e,
            ZipError::TruncatedInput { .. } => ErrorKind::UnexpectedEof,
            ZipError::UnsupportedMethod(_) | ZipError::Unsupported(_) => ErrorKind::Unsupported,
            _ => ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, ZipError>;
