//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};

/// A positional, append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset the data starts at, which equals the
///   size before the call
/// - reads never observe bytes past `size()`
/// - `truncate` only shrinks
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the range is not fully
    /// inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// Lets callers reuse one bounded buffer across many reads instead of
    /// allocating per read.
    ///
    /// # Errors
    ///
    /// Same as [`StorageBackend::read_at`].
    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let data = self.read_at(offset, buf.len())?;
        if data.len() != buf.len() {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size: self.size()?,
            });
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    /// Appends data to the end of the store and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is where the next
    /// `append` lands.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes data and file metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shrinks the store to `new_size` bytes.
    ///
    /// The segment writer uses this to drop a partially appended segment.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TruncateBeyondEnd`] if `new_size` is larger
    /// than the current size, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
