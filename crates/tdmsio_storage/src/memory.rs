//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::io;

/// A growable in-memory byte store.
///
/// Used by tests and for building a file image before writing it out.
/// [`InMemoryBackend::with_capacity_limit`] makes appends fail once the
/// store would exceed a fixed size, which lets tests exercise the writer's
/// rollback of a half-written segment.
///
/// # Example
///
/// ```rust
/// use tdmsio_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// assert_eq!(backend.append(b"TDSm").unwrap(), 0);
/// assert_eq!(backend.size().unwrap(), 4);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    limit: Option<u64>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding an existing file image.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            limit: None,
        }
    }

    /// Creates an empty backend whose appends fail past `limit` bytes.
    #[must_use]
    pub fn with_capacity_limit(limit: u64) -> Self {
        Self {
            data: RwLock::new(Vec::new()),
            limit: Some(limit),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(buf.len() as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        buf.copy_from_slice(&data[offset as usize..end as usize]);
        Ok(())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        if let Some(limit) = self.limit {
            if offset + new_data.len() as u64 > limit {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("in-memory store limited to {limit} bytes"),
                )));
            }
        }
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        data.truncate(new_size as usize);
        Ok(())
    }
}
