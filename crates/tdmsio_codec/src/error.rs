//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding format primitives.
///
/// Every variant describes malformed input; callers in `tdmsio_core`
/// surface them as format errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete value was read.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes required by the value being decoded.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// A property carried a type code outside the supported set.
    #[error("unknown property type: 0x{code:08x}")]
    UnknownPropertyType {
        /// The type code found.
        code: u32,
    },

    /// A raw data index named a type code that is not a channel type.
    #[error("unsupported channel data type: 0x{code:08x}")]
    UnsupportedDataType {
        /// The type code found.
        code: u32,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// An object path string did not match `/`, `/'g'` or `/'g'/'c'`.
    #[error("invalid object path {path:?}: {reason}")]
    InvalidObjectPath {
        /// The offending path text.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A string is too long for its 32-bit length prefix.
    #[error("string of {len} bytes exceeds the 32-bit length prefix")]
    StringTooLong {
        /// Length of the string in bytes.
        len: usize,
    },
}

impl CodecError {
    /// Creates an invalid object path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidObjectPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unexpected end of input error.
    #[must_use]
    pub fn eof(needed: usize, available: usize) -> Self {
        Self::UnexpectedEof { needed, available }
    }
}
