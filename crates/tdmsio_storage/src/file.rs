//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A TDMS file on disk.
///
/// Readers open the file read-only with [`FileBackend::open_read`]; a
/// writer uses [`FileBackend::create`] or [`FileBackend::open_append`],
/// both of which take an advisory exclusive lock that is held until the
/// backend is dropped.
///
/// # Example
///
/// ```no_run
/// use tdmsio_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("run.tdms")).unwrap();
/// backend.append(b"TDSm").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: RwLock<u64>,
    locked: bool,
}

impl FileBackend {
    /// Creates (or truncates) a file for writing and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another writer holds the file,
    /// or an I/O error.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::lock(&file, path)?;
        // Truncate only once the lock is ours so a live writer's file is
        // never clobbered.
        file.set_len(0)?;
        Ok(Self::from_parts(path, file, 0, true))
    }

    /// Opens an existing file for appending and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another writer holds the file,
    /// or an I/O error (including a missing file).
    pub fn open_append(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::lock(&file, path)?;
        let size = file.metadata()?.len();
        Ok(Self::from_parts(path, file, size, true))
    }

    /// Opens an existing file read-only. No lock is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_read(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self::from_parts(path, file, size, false))
    }

    /// Like [`FileBackend::create`], creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be created or locked.
    pub fn create_with_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::create(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this handle holds the writer lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn lock(file: &File, path: &Path) -> StorageResult<()> {
        file.try_lock_exclusive().map_err(|_| StorageError::Locked {
            path: path.display().to_string(),
        })
    }

    fn from_parts(path: &Path, file: File, size: u64, locked: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: RwLock::new(size),
            locked,
        }
    }

    fn check_range(&self, offset: u64, len: usize) -> StorageResult<()> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_into(offset, &mut buffer)?;
        Ok(buffer)
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut size = self.size.write();
        if data.is_empty() {
            return Ok(*size);
        }

        let mut file = self.file.lock();
        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut size = self.size.write();
        if new_size > *size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: *size,
            });
        }

        self.file.lock().set_len(new_size)?;
        *size = new_size;
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if self.locked {
            let _ = FileExt::unlock(&*self.file.lock());
        }
    }
}
