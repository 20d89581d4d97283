//! Lazy, random-access reader.
//!
//! Opening a file indexes its segments; channel values are only read
//! when a slice is requested, and only the byte ranges that hold the
//! requested values are touched.
//!
//! ```rust,ignore
//! let reader = TdmsReader::open("run.tdms")?;
//! for group in reader.groups() {
//!     for channel in reader.group(group)?.channels() {
//!         println!("{} has {} values", channel.path(), channel.len());
//!     }
//! }
//! let head = reader.channel("Waveforms", "SineWave")?.slice(0, 100)?;
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::index::{ChannelIndex, ChunkRef, FileIndex};
use crate::types::{ChannelValues, Properties};
use std::path::{Path, PathBuf};
use tdmsio_codec::{DataType, ObjectPath, PropertyValue};
use tdmsio_storage::{FileBackend, StorageBackend};

/// Read access to a closed TDMS file.
///
/// The reader is `Send + Sync`; channel handles borrow it and may be used
/// from several threads at once.
pub struct TdmsReader {
    backend: Box<dyn StorageBackend>,
    index: FileIndex,
    read_buffer: usize,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for TdmsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TdmsReader")
            .field("path", &self.path)
            .field("segments", &self.index.segments().len())
            .finish_non_exhaustive()
    }
}

impl TdmsReader {
    /// Opens and indexes a file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptFile`] for a damaged file, or any error
    /// met while indexing.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, &Config::default())
    }

    /// Opens and indexes a file with the given read buffer settings.
    ///
    /// # Errors
    ///
    /// See [`TdmsReader::open`].
    pub fn open_with_config(path: impl AsRef<Path>, config: &Config) -> CoreResult<Self> {
        match Self::open_partial_with_config(path, config)? {
            (reader, None) => Ok(reader),
            (_, Some(err)) => Err(err),
        }
    }

    /// Opens a file, indexing as many segments as are intact.
    ///
    /// Returns the reader together with the error that stopped indexing,
    /// if any. Groups and channels from earlier segments stay readable.
    ///
    /// # Errors
    ///
    /// Fails only if the file cannot be opened.
    pub fn open_partial(path: impl AsRef<Path>) -> CoreResult<(Self, Option<CoreError>)> {
        Self::open_partial_with_config(path, &Config::default())
    }

    fn open_partial_with_config(
        path: impl AsRef<Path>,
        config: &Config,
    ) -> CoreResult<(Self, Option<CoreError>)> {
        let path = path.as_ref();
        let backend = FileBackend::open_read(path)?;
        let (mut reader, err) = Self::from_backend_partial(Box::new(backend), config)?;
        reader.path = Some(path.to_path_buf());
        Ok((reader, err))
    }

    /// Reads from an arbitrary backend.
    ///
    /// # Errors
    ///
    /// See [`TdmsReader::open`].
    pub fn from_backend(backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        match Self::from_backend_partial(backend, &Config::default())? {
            (reader, None) => Ok(reader),
            (_, Some(err)) => Err(err),
        }
    }

    /// Reads from an arbitrary backend, tolerating a damaged tail.
    ///
    /// # Errors
    ///
    /// Fails only if the backend size cannot be read.
    pub fn from_backend_partial(
        backend: Box<dyn StorageBackend>,
        config: &Config,
    ) -> CoreResult<(Self, Option<CoreError>)> {
        let (index, err) = FileIndex::build_partial(&*backend)?;
        let reader = Self {
            backend,
            index,
            read_buffer: config.read_buffer_bytes,
            path: None,
        };
        Ok((reader, err))
    }

    /// Path of the file, if opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Group names in first-written order.
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        self.index.groups().collect()
    }

    /// Channel names of a group in first-written order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown group.
    pub fn channels(&self, group: &str) -> CoreResult<Vec<&str>> {
        self.index
            .channels(group)
            .map(|names| names.iter().map(String::as_str).collect())
            .ok_or_else(|| CoreError::not_found(format!("group '{group}'")))
    }

    /// Merged properties of an object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown object.
    pub fn properties(&self, path: &ObjectPath) -> CoreResult<&Properties> {
        self.index
            .properties(path)
            .ok_or_else(|| CoreError::not_found(path.to_string()))
    }

    /// One property of an object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown object or key.
    pub fn property(&self, path: &ObjectPath, key: &str) -> CoreResult<&PropertyValue> {
        self.properties(path)?
            .get(key)
            .ok_or_else(|| CoreError::not_found(format!("property '{key}' of {path}")))
    }

    /// File-level properties; empty if the root was never written.
    #[must_use]
    pub fn file_properties(&self) -> Properties {
        self.index
            .properties(&ObjectPath::Root)
            .cloned()
            .unwrap_or_default()
    }

    /// A group handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown group.
    pub fn group(&self, name: &str) -> CoreResult<Group<'_>> {
        let path = ObjectPath::group(name);
        let properties = self.properties(&path)?;
        let channels = self.index.channels(name).unwrap_or_default();
        Ok(Group {
            reader: self,
            name: name.to_string(),
            properties,
            channels,
        })
    }

    /// A channel handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown channel.
    pub fn channel(&self, group: &str, name: &str) -> CoreResult<Channel<'_>> {
        self.channel_at(ObjectPath::channel(group, name))
    }

    fn channel_at(&self, path: ObjectPath) -> CoreResult<Channel<'_>> {
        match (self.index.channel(&path), self.index.properties(&path)) {
            (Some(index), Some(properties)) => Ok(Channel {
                reader: self,
                path,
                index,
                properties,
            }),
            _ => Err(CoreError::not_found(format!("channel {path}"))),
        }
    }

    /// Number of values in a channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown channel.
    pub fn len(&self, path: &ObjectPath) -> CoreResult<u64> {
        self.index
            .channel(path)
            .map(ChannelIndex::len)
            .ok_or_else(|| CoreError::not_found(format!("channel {path}")))
    }

    /// Values `start..stop` of a channel.
    ///
    /// # Errors
    ///
    /// See [`Channel::slice`].
    pub fn slice(&self, path: &ObjectPath, start: u64, stop: u64) -> CoreResult<ChannelValues> {
        self.channel_at(path.clone())?.slice(start, stop)
    }

    fn read_chunk(
        &self,
        chunk: &ChunkRef,
        data_type: DataType,
        lo: u64,
        hi: u64,
        out: &mut ChannelValues,
    ) -> CoreResult<()> {
        let size = data_type.size().unwrap_or(1) as u64;
        let stride = chunk.stride.max(size);
        let per_read = (self.read_buffer as u64 / stride).max(1);
        let mut buf = Vec::new();

        let mut at = lo;
        while at < hi {
            let n = per_read.min(hi - at);
            let len = usize::try_from((n - 1) * stride + size)
                .map_err(|_| CoreError::invalid_operation("slice does not fit in memory"))?;
            buf.resize(len, 0);
            self.backend.read_into(chunk.offset + at * stride, &mut buf)?;
            out.extend_strided(&buf, n as usize, stride as usize);
            at += n;
        }
        Ok(())
    }
}

/// A group and its channels.
#[derive(Debug, Clone)]
pub struct Group<'r> {
    reader: &'r TdmsReader,
    name: String,
    properties: &'r Properties,
    channels: &'r [String],
}

impl<'r> Group<'r> {
    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group properties.
    #[must_use]
    pub fn properties(&self) -> &'r Properties {
        self.properties
    }

    /// Channel handles in first-written order.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel<'r>> {
        self.channels
            .iter()
            .filter_map(|c| self.reader.channel(&self.name, c).ok())
            .collect()
    }

    /// A channel of this group.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown channel.
    pub fn channel(&self, name: &str) -> CoreResult<Channel<'r>> {
        self.reader.channel(&self.name, name)
    }
}

/// Lazy access to one channel's values.
#[derive(Debug, Clone)]
pub struct Channel<'r> {
    reader: &'r TdmsReader,
    path: ObjectPath,
    index: &'r ChannelIndex,
    properties: &'r Properties,
}

impl<'r> Channel<'r> {
    /// Channel path.
    #[must_use]
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.channel_name().unwrap_or_default()
    }

    /// Owning group name.
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.path.group_name().unwrap_or_default()
    }

    /// Element type; `None` if the channel never had values.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        self.index.data_type()
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.index.len()
    }

    /// Returns whether the channel has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Channel properties.
    #[must_use]
    pub fn properties(&self) -> &'r Properties {
        self.properties
    }

    /// One channel property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&'r PropertyValue> {
        self.properties.get(key)
    }

    /// Values `start..stop`, with `stop` clamped to the length.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `start > stop`,
    /// [`CoreError::NotFound`] if the channel never had values, or a
    /// storage error.
    pub fn slice(&self, start: u64, stop: u64) -> CoreResult<ChannelValues> {
        if start > stop {
            return Err(CoreError::invalid_operation(format!(
                "slice start {start} is past stop {stop}"
            )));
        }
        let data_type = self
            .data_type()
            .ok_or_else(|| CoreError::not_found(format!("values of {}", self.path)))?;
        let stop = stop.min(self.len());
        let wanted = stop.saturating_sub(start);
        let mut out = ChannelValues::with_capacity(data_type, usize::try_from(wanted).unwrap_or(0))?;

        for (chunk_start, chunk) in self.index.chunks_in(start, stop) {
            let lo = start.max(chunk_start) - chunk_start;
            let hi = stop.min(chunk_start + chunk.count) - chunk_start;
            self.reader.read_chunk(chunk, data_type, lo, hi, &mut out)?;
        }
        Ok(out)
    }

    /// All values.
    ///
    /// # Errors
    ///
    /// See [`Channel::slice`].
    pub fn read_all(&self) -> CoreResult<ChannelValues> {
        self.slice(0, self.len())
    }
}
