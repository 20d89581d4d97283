//! Error types for tdmsio core.

use std::io;
use tdmsio_codec::{CodecError, DataType};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while writing or reading a TDMS file.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tdmsio_storage::StorageError),

    /// Malformed property tag, object path or string in metadata.
    #[error("format error: {0}")]
    Format(#[from] CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A channel was given a value type different from its first one.
    #[error("type conflict on {path}: declared {expected}, got {actual}")]
    TypeConflict {
        /// Channel path.
        path: String,
        /// Type fixed at the channel's first appearance.
        expected: DataType,
        /// Type supplied later.
        actual: DataType,
    },

    /// Channel data cannot be laid out as requested.
    #[error("layout error: {message}")]
    Layout {
        /// Description of the mismatch.
        message: String,
    },

    /// A lead-in or declared length does not fit the file.
    #[error("corrupt file at byte {offset}: {message}")]
    CorruptFile {
        /// Byte offset where the problem was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A group, channel or property does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Another writer holds the file.
    #[error("file is locked by another writer: {path}")]
    FileLocked {
        /// Path of the locked file.
        path: String,
    },

    /// Valid TDMS that this implementation does not read.
    #[error("unsupported: {message}")]
    Unsupported {
        /// What is unsupported.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a type conflict error.
    pub fn type_conflict(path: impl ToString, expected: DataType, actual: DataType) -> Self {
        Self::TypeConflict {
            path: path.to_string(),
            expected,
            actual,
        }
    }

    /// Creates a layout error.
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    /// Creates a corrupt file error.
    pub fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptFile {
            offset,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Byte offset for [`CoreError::CorruptFile`].
    #[must_use]
    pub fn corrupt_offset(&self) -> Option<u64> {
        match self {
            Self::CorruptFile { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub(crate) fn from_storage_open(err: tdmsio_storage::StorageError) -> Self {
        match err {
            tdmsio_storage::StorageError::Locked { path } => Self::FileLocked { path },
            other => Self::Storage(other),
        }
    }
}
