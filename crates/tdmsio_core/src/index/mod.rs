//! In-memory index of a TDMS file.
//!
//! Built once when a file is opened by scanning lead-ins and metadata.
//! The index records, for every channel, where each of its chunks lives
//! in the file so that slices can be read without touching other data.
//!
//! ## Object lists
//!
//! A segment's metadata either replaces the list of objects carrying raw
//! data (new-object-list flag set) or updates the previous segment's
//! list in place. A segment without metadata reuses the previous list
//! unchanged.

mod scan;

pub use scan::{ScannedSegment, SegmentScanner};

use crate::error::{CoreError, CoreResult};
use crate::segment::{LeadIn, RawIndex, RawIndexEntry, TocFlags};
use crate::types::Properties;
use std::collections::HashMap;
use tdmsio_codec::{DataType, ObjectPath};
use tdmsio_storage::StorageBackend;
use tracing::{debug, warn};

/// One channel's layout inside a segment's chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentChannel {
    /// Channel path.
    pub path: ObjectPath,
    /// Type and per-chunk count.
    pub index: RawIndex,
    /// Byte offset of the channel's first value within a chunk.
    pub chunk_offset: u64,
}

/// An indexed segment.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// File offset of the lead-in.
    pub offset: u64,
    /// The lead-in.
    pub lead_in: LeadIn,
    /// File offset of the raw data block.
    pub raw_data_start: u64,
    /// Length of the raw data block.
    pub raw_len: u64,
    /// Bytes in one chunk of raw data.
    pub chunk_size: u64,
    /// Number of chunks, counting a trailing partial one.
    pub chunk_count: u64,
    /// Objects in the metadata block.
    pub object_count: usize,
    /// Channels with raw data, in raw data order.
    pub channels: Vec<SegmentChannel>,
}

impl SegmentInfo {
    /// File offset just past this segment.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.raw_data_start + self.raw_len
    }
}

/// A run of values of one channel stored at a fixed stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef {
    /// Index into [`FileIndex::segments`].
    pub segment: usize,
    /// File offset of the first value.
    pub offset: u64,
    /// Number of values.
    pub count: u64,
    /// Bytes from one value to the next.
    pub stride: u64,
}

/// Where a channel's values live.
#[derive(Debug, Clone)]
pub struct ChannelIndex {
    data_type: Option<DataType>,
    chunks: Vec<ChunkRef>,
    /// Cumulative value count at the end of each chunk.
    ends: Vec<u64>,
    last_index: Option<RawIndex>,
}

impl ChannelIndex {
    fn new() -> Self {
        Self {
            data_type: None,
            chunks: Vec::new(),
            ends: Vec::new(),
            last_index: None,
        }
    }

    fn push(&mut self, chunk: ChunkRef) {
        let end = self.len() + chunk.count;
        self.chunks.push(chunk);
        self.ends.push(end);
    }

    /// Element type; `None` until the channel has had raw data.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// Total number of values.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Returns whether the channel has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunks in logical order.
    #[must_use]
    pub fn chunks(&self) -> &[ChunkRef] {
        &self.chunks
    }

    /// The most recent raw data index declared for this channel.
    #[must_use]
    pub fn last_index(&self) -> Option<RawIndex> {
        self.last_index
    }

    /// Chunks overlapping values `start..stop`, each paired with the
    /// logical position of its first value.
    pub(crate) fn chunks_in(&self, start: u64, stop: u64) -> impl Iterator<Item = (u64, &ChunkRef)> {
        let first = self.ends.partition_point(|&end| end <= start);
        let mut chunk_start = if first == 0 { 0 } else { self.ends[first - 1] };
        self.chunks[first..]
            .iter()
            .zip(&self.ends[first..])
            .map(move |(chunk, &end)| {
                let at = chunk_start;
                chunk_start = end;
                (at, chunk)
            })
            .take_while(move |(at, _)| *at < stop)
    }
}

/// The active object list carried from segment to segment.
#[derive(Debug, Clone, Default)]
struct ActiveList {
    entries: Vec<(ObjectPath, Option<RawIndex>)>,
}

impl ActiveList {
    fn upsert(&mut self, path: &ObjectPath, index: Option<RawIndex>) {
        match self.entries.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = index,
            None => self.entries.push((path.clone(), index)),
        }
    }
}

/// Index over every segment of a file.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    segments: Vec<SegmentInfo>,
    properties: HashMap<ObjectPath, Properties>,
    object_order: Vec<ObjectPath>,
    groups: Vec<String>,
    group_channels: HashMap<String, Vec<String>>,
    channels: HashMap<ObjectPath, ChannelIndex>,
    active: ActiveList,
    indexed_len: u64,
}

impl FileIndex {
    /// Indexes every segment of `backend`.
    ///
    /// # Errors
    ///
    /// Returns the first error met while scanning.
    pub fn build(backend: &dyn StorageBackend) -> CoreResult<Self> {
        match Self::build_partial(backend)? {
            (index, None) => Ok(index),
            (_, Some(err)) => Err(err),
        }
    }

    /// Indexes segments until the first error, returning that error
    /// alongside everything indexed before it.
    ///
    /// # Errors
    ///
    /// Fails only if the backend size cannot be read.
    pub fn build_partial(backend: &dyn StorageBackend) -> CoreResult<(Self, Option<CoreError>)> {
        let mut index = Self::default();
        for scanned in SegmentScanner::new(backend)? {
            let result = scanned.and_then(|segment| index.add_segment(segment));
            if let Err(err) = result {
                warn!(
                    segments = index.segments.len(),
                    indexed_len = index.indexed_len,
                    error = %err,
                    "stopped indexing"
                );
                return Ok((index, Some(err)));
            }
        }
        debug!(
            segments = index.segments.len(),
            channels = index.channels.len(),
            "indexed file"
        );
        Ok((index, None))
    }

    /// Adds one scanned segment. On error the index is unchanged.
    fn add_segment(&mut self, segment: ScannedSegment) -> CoreResult<()> {
        let active = self.next_active_list(&segment)?;

        for (path, index) in &active.entries {
            if let (Some(index), Some(expected)) =
                (index, self.channels.get(path).and_then(ChannelIndex::data_type))
            {
                if index.data_type != expected {
                    return Err(CoreError::type_conflict(path, expected, index.data_type));
                }
            }
        }

        let with_data: Vec<(&ObjectPath, RawIndex)> = active
            .entries
            .iter()
            .filter_map(|(path, index)| index.filter(|i| i.count > 0).map(|i| (path, i)))
            .collect();
        let interleaved = segment.lead_in.is_interleaved();
        if interleaved {
            if let Some((_, first)) = with_data.first() {
                if with_data.iter().any(|(_, i)| i.count != first.count) {
                    return Err(CoreError::corrupt(
                        segment.offset,
                        "interleaved channels declare different counts",
                    ));
                }
            }
        }

        let chunk_size = chunk_size(&with_data, &segment)?;

        // Validated; from here on the index only grows.
        for object in &segment.objects {
            self.register_object(&object.path);
            if let Some(props) = self.properties.get_mut(&object.path) {
                props.merge(&object.properties);
            }
        }
        for (path, index) in &active.entries {
            if let Some(index) = index {
                let channel = self.channels.entry(path.clone()).or_insert_with(ChannelIndex::new);
                channel.data_type = Some(index.data_type);
                channel.last_index = Some(*index);
            }
        }

        let seg_no = self.segments.len();
        let mut channels = Vec::with_capacity(with_data.len());
        let mut chunk_count = 0;

        if chunk_size == 0 {
            if segment.raw_len > 0 {
                warn!(offset = segment.offset, "raw data without channels ignored");
            }
        } else if interleaved {
            let stride = row_size(&with_data);
            let rows = segment.raw_len / stride;
            chunk_count = segment.raw_len.div_ceil(chunk_size);
            let mut column = 0;
            for (path, index) in &with_data {
                if rows > 0 {
                    self.push_chunk(path, seg_no, segment.raw_data_start + column, rows, stride);
                }
                channels.push(SegmentChannel {
                    path: (*path).clone(),
                    index: *index,
                    chunk_offset: column,
                });
                column += index.element_size();
            }
        } else {
            let full = segment.raw_len / chunk_size;
            let partial = segment.raw_len % chunk_size;
            chunk_count = full + u64::from(partial > 0);
            if partial > 0 {
                warn!(
                    offset = segment.offset,
                    missing = chunk_size - partial,
                    "segment ends with a partial chunk"
                );
            }
            let mut chunk_offset = 0;
            for (path, index) in &with_data {
                let size = index.element_size();
                for k in 0..full {
                    let at = segment.raw_data_start + k * chunk_size + chunk_offset;
                    self.push_chunk(path, seg_no, at, index.count, size);
                }
                let present = partial.saturating_sub(chunk_offset) / size;
                let count = index.count.min(present);
                if count > 0 {
                    let at = segment.raw_data_start + full * chunk_size + chunk_offset;
                    self.push_chunk(path, seg_no, at, count, size);
                }
                channels.push(SegmentChannel {
                    path: (*path).clone(),
                    index: *index,
                    chunk_offset,
                });
                chunk_offset += index.byte_len();
            }
        }

        debug!(
            offset = segment.offset,
            objects = segment.objects.len(),
            raw_len = segment.raw_len,
            chunks = chunk_count,
            "indexed segment"
        );
        self.indexed_len = segment.end();
        self.segments.push(SegmentInfo {
            offset: segment.offset,
            lead_in: segment.lead_in,
            raw_data_start: segment.raw_data_start,
            raw_len: segment.raw_len,
            chunk_size,
            chunk_count,
            object_count: segment.objects.len(),
            channels,
        });
        self.active = active;
        Ok(())
    }

    fn next_active_list(&self, segment: &ScannedSegment) -> CoreResult<ActiveList> {
        if !segment.lead_in.has_metadata() {
            return Ok(self.active.clone());
        }
        let mut active = if segment.lead_in.toc.contains(TocFlags::NEW_OBJ_LIST) {
            ActiveList::default()
        } else {
            self.active.clone()
        };

        for object in &segment.objects {
            let index = match object.raw_index {
                RawIndexEntry::None => None,
                RawIndexEntry::SameAsPrevious => {
                    let previous = self
                        .channels
                        .get(&object.path)
                        .and_then(ChannelIndex::last_index);
                    Some(previous.ok_or_else(|| {
                        CoreError::corrupt(
                            segment.offset,
                            format!("{} reuses a raw data index it never declared", object.path),
                        )
                    })?)
                }
                RawIndexEntry::Index(index) => Some(index),
            };
            if index.is_some() && !object.path.is_channel() {
                return Err(CoreError::corrupt(
                    segment.offset,
                    format!("{} is not a channel but declares raw data", object.path),
                ));
            }
            if object.path.is_channel() {
                active.upsert(&object.path, index);
            }
        }
        Ok(active)
    }

    fn register_object(&mut self, path: &ObjectPath) {
        if let ObjectPath::Channel { group, .. } = path {
            self.register_object(&ObjectPath::group(group.clone()));
        }
        if self.properties.contains_key(path) {
            return;
        }
        self.properties.insert(path.clone(), Properties::new());
        self.object_order.push(path.clone());
        match path {
            ObjectPath::Root => {}
            ObjectPath::Group { group } => {
                self.groups.push(group.clone());
                self.group_channels.entry(group.clone()).or_default();
            }
            ObjectPath::Channel { group, channel } => {
                self.group_channels
                    .entry(group.clone())
                    .or_default()
                    .push(channel.clone());
                self.channels.entry(path.clone()).or_insert_with(ChannelIndex::new);
            }
        }
    }

    fn push_chunk(&mut self, path: &ObjectPath, segment: usize, offset: u64, count: u64, stride: u64) {
        if let Some(channel) = self.channels.get_mut(path) {
            channel.push(ChunkRef {
                segment,
                offset,
                count,
                stride,
            });
        }
    }

    /// Indexed segments in file order.
    #[must_use]
    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    /// File offset just past the last indexed segment.
    #[must_use]
    pub fn indexed_len(&self) -> u64 {
        self.indexed_len
    }

    /// Group names in first-seen order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Channel names of `group` in first-seen order.
    #[must_use]
    pub fn channels(&self, group: &str) -> Option<&[String]> {
        self.group_channels.get(group).map(Vec::as_slice)
    }

    /// Every object path in first-seen order.
    pub fn object_paths(&self) -> impl Iterator<Item = &ObjectPath> {
        self.object_order.iter()
    }

    /// Merged properties of an object.
    #[must_use]
    pub fn properties(&self, path: &ObjectPath) -> Option<&Properties> {
        self.properties.get(path)
    }

    /// Raw data index of a channel.
    #[must_use]
    pub fn channel(&self, path: &ObjectPath) -> Option<&ChannelIndex> {
        self.channels.get(path)
    }
}

/// Bytes in one chunk of `segment`.
///
/// Fails if the declared counts overflow, or if a terminated segment
/// declares more bytes for one channel than its raw data block holds.
fn chunk_size(channels: &[(&ObjectPath, RawIndex)], segment: &ScannedSegment) -> CoreResult<u64> {
    let mut total: u64 = 0;
    for (path, index) in channels {
        let len = index
            .checked_byte_len()
            .filter(|len| segment.lead_in.is_unterminated() || *len <= segment.raw_len)
            .ok_or_else(|| {
                CoreError::corrupt(
                    segment.offset,
                    format!("{path} declares {} values, more than the raw data holds", index.count),
                )
            })?;
        total = total
            .checked_add(len)
            .ok_or_else(|| CoreError::corrupt(segment.offset, "chunk size overflows"))?;
    }
    Ok(total)
}

fn row_size(channels: &[(&ObjectPath, RawIndex)]) -> u64 {
    channels.iter().map(|(_, i)| i.element_size()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{encode_metadata, ObjectMetadata};
    use tdmsio_storage::InMemoryBackend;

    fn segment(toc: TocFlags, objects: &[ObjectMetadata], raw: &[u8]) -> Vec<u8> {
        let meta = if objects.is_empty() {
            Vec::new()
        } else {
            encode_metadata(objects).unwrap()
        };
        let mut out = LeadIn::new(toc, meta.len() as u64, raw.len() as u64).encode().to_vec();
        out.extend_from_slice(&meta);
        out.extend_from_slice(raw);
        out
    }

    fn channel(name: &str, raw_index: RawIndexEntry) -> ObjectMetadata {
        ObjectMetadata {
            path: ObjectPath::channel("g", name),
            raw_index,
            properties: Properties::new(),
        }
    }

    fn i16_index(count: u64) -> RawIndexEntry {
        RawIndexEntry::Index(RawIndex {
            data_type: DataType::I16,
            count,
        })
    }

    const FULL: TocFlags = TocFlags::from_bits(0b1110);

    #[test]
    fn repeated_chunks_are_split() {
        // Two chunks of (a: 2 values, b: 1 value).
        let objects = [channel("a", i16_index(2)), channel("b", i16_index(1))];
        let raw = [1, 0, 2, 0, 9, 0, 3, 0, 4, 0, 8, 0];
        let backend = InMemoryBackend::with_data(segment(FULL, &objects, &raw));

        let index = FileIndex::build(&backend).unwrap();
        let a = index.channel(&ObjectPath::channel("g", "a")).unwrap();
        let b = index.channel(&ObjectPath::channel("g", "b")).unwrap();
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 2);
        assert_eq!(a.chunks().len(), 2);
        assert_eq!(a.chunks()[1].offset - a.chunks()[0].offset, 6);
        assert_eq!(index.segments()[0].chunk_count, 2);
    }

    #[test]
    fn partial_final_chunk_counts_present_values() {
        let objects = [channel("a", i16_index(3)), channel("b", i16_index(3))];
        // One full chunk (12 bytes) plus 8 bytes: a gets 3, b gets 1.
        let raw = [0u8; 20];
        let backend = InMemoryBackend::with_data(segment(FULL, &objects, &raw));

        let index = FileIndex::build(&backend).unwrap();
        assert_eq!(index.channel(&ObjectPath::channel("g", "a")).unwrap().len(), 6);
        assert_eq!(index.channel(&ObjectPath::channel("g", "b")).unwrap().len(), 4);
    }

    #[test]
    fn object_list_carries_over_without_new_list_flag() {
        let mut bytes = segment(FULL, &[channel("a", i16_index(1))], &[1, 0]);
        // Metadata without the new-object-list flag adds b; a keeps its index.
        let toc = TocFlags::META_DATA | TocFlags::RAW_DATA;
        bytes.extend(segment(toc, &[channel("b", i16_index(1))], &[2, 0, 3, 0]));
        // No metadata at all: same list again.
        bytes.extend(segment(TocFlags::RAW_DATA, &[], &[4, 0, 5, 0]));
        let backend = InMemoryBackend::with_data(bytes);

        let index = FileIndex::build(&backend).unwrap();
        assert_eq!(index.channel(&ObjectPath::channel("g", "a")).unwrap().len(), 3);
        assert_eq!(index.channel(&ObjectPath::channel("g", "b")).unwrap().len(), 2);
    }

    #[test]
    fn same_as_previous_needs_a_previous() {
        let bytes = segment(FULL, &[channel("a", RawIndexEntry::SameAsPrevious)], &[0, 0]);
        let backend = InMemoryBackend::with_data(bytes);
        let err = FileIndex::build(&backend).unwrap_err();
        assert_eq!(err.corrupt_offset(), Some(0));
    }

    #[test]
    fn type_change_is_conflict_and_keeps_earlier_segments() {
        let mut bytes = segment(FULL, &[channel("a", i16_index(1))], &[1, 0]);
        let f64_index = RawIndexEntry::Index(RawIndex {
            data_type: DataType::F64,
            count: 1,
        });
        bytes.extend(segment(FULL, &[channel("a", f64_index)], &[0u8; 8]));
        let backend = InMemoryBackend::with_data(bytes);

        let (index, err) = FileIndex::build_partial(&backend).unwrap();
        assert!(matches!(err, Some(CoreError::TypeConflict { .. })));
        assert_eq!(index.segments().len(), 1);
        assert_eq!(index.channel(&ObjectPath::channel("g", "a")).unwrap().len(), 1);
    }

    #[test]
    fn groups_are_implied_by_channels() {
        let bytes = segment(FULL, &[channel("a", RawIndexEntry::None)], &[]);
        let backend = InMemoryBackend::with_data(bytes);
        let index = FileIndex::build(&backend).unwrap();
        assert_eq!(index.groups().collect::<Vec<_>>(), ["g"]);
        assert_eq!(index.channels("g").unwrap(), ["a"]);
        assert!(index.properties(&ObjectPath::group("g")).unwrap().is_empty());
        assert_eq!(index.channel(&ObjectPath::channel("g", "a")).unwrap().data_type(), None);
    }

    #[test]
    fn overflowing_count_is_corrupt() {
        let huge = RawIndexEntry::Index(RawIndex {
            data_type: DataType::F64,
            count: u64::MAX / 4,
        });
        let mut bytes = segment(FULL, &[channel("a", i16_index(1))], &[1, 0]);
        bytes.extend(segment(FULL, &[channel("b", huge)], &[0u8; 16]));
        let backend = InMemoryBackend::with_data(bytes);

        let (index, err) = FileIndex::build_partial(&backend).unwrap();
        assert_eq!(err.unwrap().corrupt_offset(), Some(index.indexed_len()));
        assert_eq!(index.segments().len(), 1);
        assert_eq!(index.channel(&ObjectPath::channel("g", "a")).unwrap().len(), 1);
    }

    #[test]
    fn chunk_size_sum_overflow_is_corrupt() {
        let half = RawIndexEntry::Index(RawIndex {
            data_type: DataType::U8,
            count: u64::MAX / 2 + 1,
        });
        let mut lead_in = LeadIn::new(FULL, 0, 0);
        lead_in.next_segment_offset = u64::MAX;
        let meta = encode_metadata(&[channel("a", half), channel("b", half)]).unwrap();
        lead_in.raw_data_offset = meta.len() as u64;
        let mut bytes = lead_in.encode().to_vec();
        bytes.extend_from_slice(&meta);
        bytes.extend_from_slice(&[0u8; 4]);
        let backend = InMemoryBackend::with_data(bytes);

        let err = FileIndex::build(&backend).unwrap_err();
        assert_eq!(err.corrupt_offset(), Some(0));
    }

    #[test]
    fn count_beyond_raw_data_is_corrupt() {
        let bytes = segment(FULL, &[channel("a", i16_index(100))], &[0u8; 8]);
        let backend = InMemoryBackend::with_data(bytes);
        let err = FileIndex::build(&backend).unwrap_err();
        assert!(matches!(err, CoreError::CorruptFile { .. }));
        assert_eq!(err.corrupt_offset(), Some(0));
    }

    #[test]
    fn interleaved_channels_share_a_stride() {
        let toc = FULL | TocFlags::INTERLEAVED;
        let objects = [channel("a", i16_index(2)), channel("b", i16_index(2))];
        let raw = [1, 0, 10, 0, 2, 0, 20, 0];
        let backend = InMemoryBackend::with_data(segment(toc, &objects, &raw));

        let index = FileIndex::build(&backend).unwrap();
        let b = index.channel(&ObjectPath::channel("g", "b")).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.chunks()[0].stride, 4);
        assert_eq!(b.chunks()[0].offset, index.segments()[0].raw_data_start + 2);
    }
}
