//! Writer statistics.
//!
//! ```rust,ignore
//! let mut writer = TdmsWriter::create("run.tdms")?;
//! writer.write_segment(&updates)?;
//!
//! let stats = writer.stats().snapshot();
//! println!("segments: {}, raw bytes: {}", stats.segments, stats.raw_bytes);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a [`crate::TdmsWriter`].
///
/// All counters are atomic and can be read while a write is in progress.
#[derive(Debug, Default)]
pub struct WriterStats {
    /// Segments appended.
    segments: AtomicU64,
    /// Segments that were a bare lead-in.
    empty_segments: AtomicU64,
    /// Segments rolled back after a failed append.
    rolled_back: AtomicU64,
    /// Lead-in and metadata bytes appended.
    metadata_bytes: AtomicU64,
    /// Raw data bytes appended.
    raw_bytes: AtomicU64,
    /// Channel values appended.
    values: AtomicU64,
}

impl WriterStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a committed segment.
    pub(crate) fn record_segment(&self, metadata_bytes: u64, raw_bytes: u64, values: u64) {
        self.segments.fetch_add(1, Ordering::Relaxed);
        if metadata_bytes == crate::segment::LEAD_IN_SIZE as u64 && raw_bytes == 0 {
            self.empty_segments.fetch_add(1, Ordering::Relaxed);
        }
        self.metadata_bytes.fetch_add(metadata_bytes, Ordering::Relaxed);
        self.raw_bytes.fetch_add(raw_bytes, Ordering::Relaxed);
        self.values.fetch_add(values, Ordering::Relaxed);
    }

    /// Records a segment that was truncated away after a failure.
    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of segments appended.
    pub fn segments(&self) -> u64 {
        self.segments.load(Ordering::Relaxed)
    }

    /// Returns the number of bare lead-in segments.
    pub fn empty_segments(&self) -> u64 {
        self.empty_segments.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back segments.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    /// Returns lead-in plus metadata bytes appended.
    pub fn metadata_bytes(&self) -> u64 {
        self.metadata_bytes.load(Ordering::Relaxed)
    }

    /// Returns raw data bytes appended.
    pub fn raw_bytes(&self) -> u64 {
        self.raw_bytes.load(Ordering::Relaxed)
    }

    /// Returns channel values appended.
    pub fn values(&self) -> u64 {
        self.values.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            segments: self.segments(),
            empty_segments: self.empty_segments(),
            rolled_back: self.rolled_back(),
            metadata_bytes: self.metadata_bytes(),
            raw_bytes: self.raw_bytes(),
            values: self.values(),
        }
    }
}

/// A point-in-time copy of [`WriterStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Segments appended.
    pub segments: u64,
    /// Segments that were a bare lead-in.
    pub empty_segments: u64,
    /// Segments rolled back after a failed append.
    pub rolled_back: u64,
    /// Lead-in and metadata bytes appended.
    pub metadata_bytes: u64,
    /// Raw data bytes appended.
    pub raw_bytes: u64,
    /// Channel values appended.
    pub values: u64,
}

impl StatsSnapshot {
    /// Total bytes appended.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.metadata_bytes + self.raw_bytes
    }
}
