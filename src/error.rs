//! Error types for shell item decoding.
//!
//! Decoding is bounds-checked everywhere: any read that would leave the
//! buffer surfaces as one of the overrun variants below. Soft problems such
//! as malformed DOS timestamps or odd-length UTF-16 data are resolved locally
//! and never become errors.

use std::io;
use thiserror::Error;

/// Result type alias for shell item operations.
pub type Result<T> = std::result::Result<T, ShellItemError>;

/// Errors that can occur while decoding shell items.
#[derive(Error, Debug)]
pub enum ShellItemError {
    /// I/O error occurred while loading a buffer from disk.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fixed-size read does not fit inside the buffer.
    #[error("Buffer overrun: read of {length} bytes at offset {offset:#x} (buffer length: {buffer_len:#x})")]
    BufferOverrun {
        /// Absolute offset of the attempted read.
        offset: usize,
        /// Number of bytes the read required.
        length: usize,
        /// Total length of the buffer.
        buffer_len: usize,
    },

    /// A NUL-terminated string has no terminator before the end of the buffer.
    #[error("Unterminated string at offset {offset:#x} (buffer length: {buffer_len:#x})")]
    UnterminatedString {
        /// Absolute offset where the string starts.
        offset: usize,
        /// Total length of the buffer.
        buffer_len: usize,
    },
}

impl ShellItemError {
    /// Creates a buffer overrun error with context.
    ///
    /// # Arguments
    ///
    /// * `offset` - Absolute offset of the read
    /// * `length` - Number of bytes requested
    /// * `buffer_len` - Length of the buffer for context
    pub fn overrun(offset: usize, length: usize, buffer_len: usize) -> Self {
        Self::BufferOverrun {
            offset,
            length,
            buffer_len,
        }
    }

    /// Creates an unterminated string error.
    pub fn unterminated(offset: usize, buffer_len: usize) -> Self {
        Self::UnterminatedString { offset, buffer_len }
    }

    /// Returns true if this error means a read ran past the end of the buffer.
    ///
    /// Both fixed-size overruns and unterminated strings count; this is the
    /// condition the file entry decoder recovers from with a fragment record.
    pub fn is_overrun(&self) -> bool {
        matches!(
            self,
            Self::BufferOverrun { .. } | Self::UnterminatedString { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_overrun() {
        assert!(ShellItemError::overrun(0x10, 4, 0x12).is_overrun());
        assert!(ShellItemError::unterminated(0x10, 0x12).is_overrun());

        let io_err = ShellItemError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(!io_err.is_overrun());
    }

    #[test]
    fn test_overrun_message() {
        let err = ShellItemError::overrun(0x20, 16, 0x24);
        assert_eq!(
            err.to_string(),
            "Buffer overrun: read of 16 bytes at offset 0x20 (buffer length: 0x24)"
        );
    }
}
