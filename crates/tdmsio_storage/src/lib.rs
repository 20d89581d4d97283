//! # tdmsio storage
//!
//! Byte stores that a TDMS file lives in.
//!
//! Backends know nothing about segments, lead-ins or channels. The format
//! engine in `tdmsio_core` only ever appends whole segments and reads
//! byte ranges back, so a backend needs exactly that: positional reads,
//! appends, flush/sync and truncation (used to roll back a segment whose
//! append failed half way).
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - a file on disk, optionally locked for a single writer
//! - [`InMemoryBackend`] - a growable buffer, for tests and scratch files
//!
//! ## Example
//!
//! ```rust
//! use tdmsio_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"TDSm").unwrap();
//! let mut tag = [0u8; 4];
//! backend.read_into(offset, &mut tag).unwrap();
//! assert_eq!(&tag, b"TDSm");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
