//! Streaming raw-data encoder.
//!
//! Channel arrays are encoded into a reusable buffer of at most
//! `capacity` bytes, which is handed to a [`RawSink`] whenever it fills.
//! Peak memory is the buffer, not the array.
//!
//! An interleaved row wider than `capacity` cannot be split, so each such
//! row goes to the sink on its own and the buffer stays within bounds.

use crate::error::{CoreError, CoreResult};
use crate::types::{ChannelValues, DataLayout};
use tdmsio_storage::StorageBackend;

/// Destination for encoded raw data.
pub trait RawSink {
    /// Consumes one buffer of encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be stored.
    fn write_raw(&mut self, bytes: &[u8]) -> CoreResult<()>;
}

impl RawSink for Vec<u8> {
    fn write_raw(&mut self, bytes: &[u8]) -> CoreResult<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl RawSink for dyn StorageBackend + '_ {
    fn write_raw(&mut self, bytes: &[u8]) -> CoreResult<()> {
        self.append(bytes)?;
        Ok(())
    }
}

/// Encodes channel arrays in bounded pieces.
#[derive(Debug)]
pub struct ChunkedDataEncoder {
    buffer: Vec<u8>,
    capacity: usize,
    flushes: u64,
}

impl ChunkedDataEncoder {
    /// Creates an encoder whose buffer holds at most `capacity` bytes
    /// (rounded up to fit one element of the widest type).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(8);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            flushes: 0,
        }
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffers handed to sinks so far.
    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Total bytes [`ChunkedDataEncoder::encode`] will produce.
    #[must_use]
    pub fn encoded_len(channels: &[&ChannelValues]) -> u64 {
        channels.iter().map(|c| c.byte_len()).sum()
    }

    /// Checks that `channels` can be laid out as `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Layout`] if interleaved channels differ in length.
    pub fn check_layout(channels: &[&ChannelValues], layout: DataLayout) -> CoreResult<()> {
        if layout == DataLayout::Interleaved {
            if let Some(first) = channels.first() {
                if let Some(odd) = channels.iter().find(|c| c.len() != first.len()) {
                    return Err(CoreError::layout(format!(
                        "interleaved channels differ in length: {} vs {}",
                        first.len(),
                        odd.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encodes `channels` into `sink` and returns the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Layout`] for an invalid interleaved layout, or
    /// any error from the sink. Nothing is written if the layout check
    /// fails.
    pub fn encode<S: RawSink + ?Sized>(
        &mut self,
        channels: &[&ChannelValues],
        layout: DataLayout,
        sink: &mut S,
    ) -> CoreResult<u64> {
        Self::check_layout(channels, layout)?;
        self.buffer.clear();

        let mut written = 0;
        match layout {
            DataLayout::Contiguous => {
                for values in channels {
                    written += self.encode_contiguous(values, sink)?;
                }
            }
            DataLayout::Interleaved => written += self.encode_interleaved(channels, sink)?,
        }
        written += self.flush(sink)?;
        Ok(written)
    }

    fn encode_contiguous<S: RawSink + ?Sized>(
        &mut self,
        values: &ChannelValues,
        sink: &mut S,
    ) -> CoreResult<u64> {
        let size = values.element_size();
        let mut written = 0;
        let mut start = 0;
        while start < values.len() {
            let room = (self.capacity - self.buffer.len()) / size;
            if room == 0 {
                written += self.flush(sink)?;
                continue;
            }
            let end = values.len().min(start + room);
            values.encode_range(start, end, &mut self.buffer);
            start = end;
        }
        Ok(written)
    }

    fn encode_interleaved<S: RawSink + ?Sized>(
        &mut self,
        channels: &[&ChannelValues],
        sink: &mut S,
    ) -> CoreResult<u64> {
        let Some(rows) = channels.first().map(|c| c.len()) else {
            return Ok(0);
        };
        let row_size: usize = channels.iter().map(|c| c.element_size()).sum();
        if row_size > self.capacity {
            return self.encode_wide_rows(channels, rows, row_size, sink);
        }
        let mut written = 0;
        for row in 0..rows {
            if self.capacity - self.buffer.len() < row_size {
                written += self.flush(sink)?;
            }
            for values in channels {
                values.encode_range(row, row + 1, &mut self.buffer);
            }
        }
        Ok(written)
    }

    fn encode_wide_rows<S: RawSink + ?Sized>(
        &mut self,
        channels: &[&ChannelValues],
        rows: usize,
        row_size: usize,
        sink: &mut S,
    ) -> CoreResult<u64> {
        let mut written = self.flush(sink)?;
        let mut row_bytes = Vec::with_capacity(row_size);
        for row in 0..rows {
            row_bytes.clear();
            for values in channels {
                values.encode_range(row, row + 1, &mut row_bytes);
            }
            sink.write_raw(&row_bytes)?;
            self.flushes += 1;
            written += row_bytes.len() as u64;
        }
        Ok(written)
    }

    fn flush<S: RawSink + ?Sized>(&mut self, sink: &mut S) -> CoreResult<u64> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        sink.write_raw(&self.buffer)?;
        self.flushes += 1;
        let n = self.buffer.len() as u64;
        self.buffer.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Records the size of every buffer it receives.
    #[derive(Default)]
    struct Recorder {
        bytes: Vec<u8>,
        sizes: Vec<usize>,
    }

    impl RawSink for Recorder {
        fn write_raw(&mut self, bytes: &[u8]) -> CoreResult<()> {
            self.sizes.push(bytes.len());
            self.bytes.extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn contiguous_is_back_to_back() {
        let a = ChannelValues::from(vec![1u8, 2, 3]);
        let b = ChannelValues::from(vec![0x0102u16]);
        let mut out = Vec::new();
        let n = ChunkedDataEncoder::new(64)
            .encode(&[&a, &b], DataLayout::Contiguous, &mut out)
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, [1, 2, 3, 0x02, 0x01]);
    }

    #[test]
    fn interleaved_is_row_major() {
        let a = ChannelValues::from((0..3).collect::<Vec<i32>>());
        let b = ChannelValues::from(vec![10i32, 20, 30]);
        let mut out = Vec::new();
        ChunkedDataEncoder::new(64)
            .encode(&[&a, &b], DataLayout::Interleaved, &mut out)
            .unwrap();
        let words: Vec<i32> = out
            .chunks_exact(4)
            .map(|w| i32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        assert_eq!(words, [0, 10, 1, 20, 2, 30]);
    }

    #[test]
    fn interleaved_length_mismatch_writes_nothing() {
        let a = ChannelValues::from(vec![1.0f64; 3]);
        let b = ChannelValues::from(vec![1.0f64; 4]);
        let mut out = Vec::new();
        let err = ChunkedDataEncoder::new(64)
            .encode(&[&a, &b], DataLayout::Interleaved, &mut out)
            .unwrap_err();
        assert!(matches!(err, CoreError::Layout { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let values = ChannelValues::from(vec![0.5f64; 10_000]);
        let mut sink = Recorder::default();
        let mut encoder = ChunkedDataEncoder::new(1000);
        let n = encoder
            .encode(&[&values], DataLayout::Contiguous, &mut sink)
            .unwrap();
        assert_eq!(n, 80_000);
        assert_eq!(sink.bytes.len(), 80_000);
        assert!(sink.sizes.iter().all(|s| *s <= 1000));
        assert_eq!(encoder.flushes(), sink.sizes.len() as u64);
    }

    #[test]
    fn rows_wider_than_capacity_bypass_the_buffer() {
        let a = ChannelValues::from(vec![1.0f64, 2.0, 3.0, 4.0]);
        let b = ChannelValues::from(vec![5.0f64, 6.0, 7.0, 8.0]);
        let c = ChannelValues::from(vec![9.0f64, 10.0, 11.0, 12.0]);

        let mut whole = Vec::new();
        ChunkedDataEncoder::new(4096)
            .encode(&[&a, &b, &c], DataLayout::Interleaved, &mut whole)
            .unwrap();

        let mut sink = Recorder::default();
        let mut encoder = ChunkedDataEncoder::new(16);
        let n = encoder
            .encode(&[&a, &b, &c], DataLayout::Interleaved, &mut sink)
            .unwrap();
        assert_eq!(n, 96);
        assert_eq!(sink.bytes, whole);
        assert_eq!(sink.sizes, [24, 24, 24, 24]);
        assert_eq!(encoder.flushes(), 4);
    }

    #[test]
    fn encoded_len_matches_output() {
        let a = ChannelValues::from(vec![true, false]);
        let b = ChannelValues::from(vec![1i64, 2, 3]);
        let mut out = Vec::new();
        ChunkedDataEncoder::new(16)
            .encode(&[&a, &b], DataLayout::Contiguous, &mut out)
            .unwrap();
        assert_eq!(ChunkedDataEncoder::encoded_len(&[&a, &b]), out.len() as u64);
    }

    proptest! {
        #[test]
        fn split_writes_concatenate_to_single_write(
            values in prop::collection::vec(any::<i32>(), 0..500),
            parts in 1usize..8,
            capacity in 8usize..256,
        ) {
            let whole = ChannelValues::from(values.clone());
            let mut single = Vec::new();
            ChunkedDataEncoder::new(4096)
                .encode(&[&whole], DataLayout::Contiguous, &mut single)
                .unwrap();

            let mut encoder = ChunkedDataEncoder::new(capacity);
            let mut split = Vec::new();
            let step = values.len().div_ceil(parts).max(1);
            for piece in values.chunks(step) {
                let piece = ChannelValues::from(piece);
                encoder.encode(&[&piece], DataLayout::Contiguous, &mut split).unwrap();
            }
            prop_assert_eq!(single, split);
        }
    }
}
