//! Sequential lead-in scanner.
//!
//! Walks a file segment by segment, reading only lead-ins and metadata
//! blocks. Raw data is skipped using the offsets in each lead-in, so a
//! scan costs one or two reads per segment regardless of file size.

use crate::error::{CoreError, CoreResult};
use crate::segment::{decode_metadata, LeadIn, ObjectMetadata, LEAD_IN_SIZE};
use tdmsio_storage::StorageBackend;
use tracing::warn;

/// A segment as found on disk.
#[derive(Debug, Clone)]
pub struct ScannedSegment {
    /// File offset of the lead-in.
    pub offset: u64,
    /// The decoded lead-in.
    pub lead_in: LeadIn,
    /// Decoded metadata block; empty without the metadata flag.
    pub objects: Vec<ObjectMetadata>,
    /// File offset of the raw data block.
    pub raw_data_start: u64,
    /// Length of the raw data block.
    pub raw_len: u64,
}

impl ScannedSegment {
    /// File offset just past this segment.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.raw_data_start + self.raw_len
    }
}

/// Iterates over the segments of a backend.
///
/// Stops after the first error; the error reports where the file went
/// wrong:
///
/// - a lead-in or declared segment that runs past the end of the file
///   yields [`CoreError::CorruptFile`] at the file size
/// - a bad tag yields [`CoreError::CorruptFile`] at the segment start
pub struct SegmentScanner<'a> {
    backend: &'a dyn StorageBackend,
    file_size: u64,
    offset: u64,
    done: bool,
}

impl<'a> SegmentScanner<'a> {
    /// Creates a scanner starting at the first byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            backend,
            file_size: backend.size()?,
            offset: 0,
            done: false,
        })
    }

    /// Size of the scanned file.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    fn read_segment(&self) -> CoreResult<ScannedSegment> {
        let offset = self.offset;
        let remaining = self.file_size - offset;
        if remaining < LEAD_IN_SIZE as u64 {
            return Err(CoreError::corrupt(
                self.file_size,
                format!("truncated lead-in: segment at byte {offset} has {remaining} of 28 bytes"),
            ));
        }

        let mut raw = [0u8; LEAD_IN_SIZE];
        self.backend.read_into(offset, &mut raw)?;
        let lead_in = LeadIn::decode(&raw, offset)?;

        let body_start = offset + LEAD_IN_SIZE as u64;
        let available = self.file_size - body_start;
        let body_len = if lead_in.is_unterminated() {
            if lead_in.raw_data_offset > available {
                return Err(CoreError::corrupt(
                    self.file_size,
                    format!("metadata of unterminated segment at byte {offset} runs past end of file"),
                ));
            }
            warn!(offset, "segment length unset, assuming it extends to end of file");
            available
        } else {
            lead_in.next_segment_offset
        };
        if body_len > available {
            return Err(CoreError::corrupt(
                self.file_size,
                format!(
                    "segment at byte {offset} declares {body_len} bytes, only {available} present"
                ),
            ));
        }

        let objects = if lead_in.has_metadata() {
            let len = usize::try_from(lead_in.raw_data_offset)
                .map_err(|_| CoreError::corrupt(offset, "metadata block too large"))?;
            let bytes = self.backend.read_at(body_start, len)?;
            decode_metadata(&bytes, body_start)?
        } else {
            Vec::new()
        };

        let raw_len = if lead_in.has_raw_data() {
            body_len - lead_in.raw_data_offset
        } else {
            0
        };

        Ok(ScannedSegment {
            offset,
            lead_in,
            objects,
            raw_data_start: body_start + lead_in.raw_data_offset,
            raw_len,
        })
    }
}

impl Iterator for SegmentScanner<'_> {
    type Item = CoreResult<ScannedSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.file_size {
            return None;
        }
        match self.read_segment() {
            Ok(segment) => {
                self.offset = if segment.lead_in.is_unterminated() {
                    self.file_size
                } else {
                    segment.offset + LEAD_IN_SIZE as u64 + segment.lead_in.next_segment_offset
                };
                Some(Ok(segment))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
