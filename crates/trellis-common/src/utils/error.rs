//! Error types shared by every Trellis crate.
//!
//! Low-level byte-cursor failures are reported as [`StorageError`] and are
//! meant to be caught at record boundaries; everything a caller may need to
//! react to is a variant of [`Error`].

use thiserror::Error;

use crate::types::Rid;

/// Result type alias using the Trellis [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A value or record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored bytes are unreadable.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The referenced record does not exist (or was already deleted).
    #[error("record {0} not found")]
    RecordNotFound(Rid),

    /// Encryption or decryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Schema lookup or definition failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// An iterator was advanced past its last element.
    #[error("no more elements")]
    NoSuchElement,

    /// An operation was invoked in a state that does not allow it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A caller-supplied argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error reports a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_))
    }

    /// Shorthand for a [`StorageError::Corruption`] error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Storage(StorageError::Corruption(message.into()))
    }
}

/// Errors raised while reading raw record or segment bytes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Structurally invalid content.
    #[error("corrupted data: {0}")]
    Corruption(String),

    /// A read went past the end of the buffer.
    #[error("buffer underflow at position {position}: needed {needed} bytes, buffer length {length}")]
    BufferUnderflow {
        /// Cursor position when the read started.
        position: usize,
        /// Number of bytes requested.
        needed: usize,
        /// Total buffer length.
        length: usize,
    },

    /// A type tag byte outside the registry.
    #[error("unknown type tag {0}")]
    InvalidTypeTag(u8),

    /// A record type byte outside the known set.
    #[error("unknown record type {0}")]
    InvalidRecordType(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(Error::RecordNotFound(Rid::new(3, 7)).is_not_found());
        assert!(!Error::NoSuchElement.is_not_found());
    }

    #[test]
    fn test_storage_error_converts() {
        let err: Error = StorageError::InvalidTypeTag(99).into();
        assert!(matches!(err, Error::Storage(StorageError::InvalidTypeTag(99))));
        assert_eq!(err.to_string(), "storage error: unknown type tag 99");
    }
}
