//! Writer and reader configuration.

use crate::types::DataLayout;

/// Smallest accepted buffer size; holds two values of any channel type.
/// Interleaved rows wider than the encode buffer are written unbuffered.
const MIN_BUFFER_BYTES: usize = 16;

/// Configuration for opening a writer or reader.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on the raw-data encode buffer, in bytes. Each
    /// interleaved row wider than this goes to the file in its own write.
    pub chunk_bytes: usize,

    /// Upper bound on the buffer used when slicing channel data.
    pub read_buffer_bytes: usize,

    /// Raw-data layout used by [`crate::TdmsWriter::write_segment`].
    pub layout: DataLayout,

    /// Flush the backend after every segment.
    pub flush_each_segment: bool,

    /// Sync data and metadata to disk when the writer closes.
    pub sync_on_close: bool,

    /// Create missing parent directories when creating a file.
    pub create_dirs: bool,

    /// In append mode, drop a truncated trailing segment instead of failing.
    pub repair_truncated_tail: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_bytes: 64 * 1024,       // 64 KB
            read_buffer_bytes: 64 * 1024, // 64 KB
            layout: DataLayout::Contiguous,
            flush_each_segment: false,
            sync_on_close: true,
            create_dirs: false,
            repair_truncated_tail: false,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw-data encode buffer size (at least 16 bytes).
    #[must_use]
    pub fn chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(MIN_BUFFER_BYTES);
        self
    }

    /// Sets the read buffer size (at least 16 bytes).
    #[must_use]
    pub fn read_buffer_bytes(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(MIN_BUFFER_BYTES);
        self
    }

    /// Sets the default raw-data layout.
    #[must_use]
    pub const fn layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets whether every segment is flushed.
    #[must_use]
    pub const fn flush_each_segment(mut self, value: bool) -> Self {
        self.flush_each_segment = value;
        self
    }

    /// Sets whether closing syncs to disk.
    #[must_use]
    pub const fn sync_on_close(mut self, value: bool) -> Self {
        self.sync_on_close = value;
        self
    }

    /// Sets whether parent directories are created.
    #[must_use]
    pub const fn create_dirs(mut self, value: bool) -> Self {
        self.create_dirs = value;
        self
    }

    /// Sets whether append mode repairs a truncated tail.
    #[must_use]
    pub const fn repair_truncated_tail(mut self, value: bool) -> Self {
        self.repair_truncated_tail = value;
        self
    }
}
