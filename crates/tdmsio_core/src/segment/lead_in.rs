//! The fixed-size segment lead-in.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::ops::BitOr;

/// Size of a lead-in in bytes.
pub const LEAD_IN_SIZE: usize = 28;

/// Tag at the start of every segment.
pub const SEGMENT_TAG: [u8; 4] = *b"TDSm";

/// Version number written by this crate.
pub const FORMAT_VERSION: u32 = 4713;

/// Oldest version accepted when reading.
const MIN_READ_VERSION: u32 = 4712;

/// Table-of-contents bit flags.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TocFlags(u32);

impl TocFlags {
    /// The segment carries a metadata block.
    pub const META_DATA: Self = Self(1 << 1);
    /// The metadata replaces the previous segment's object list.
    pub const NEW_OBJ_LIST: Self = Self(1 << 2);
    /// The segment carries raw data.
    pub const RAW_DATA: Self = Self(1 << 3);
    /// Raw data is interleaved.
    pub const INTERLEAVED: Self = Self(1 << 5);
    /// Numbers are big-endian.
    pub const BIG_ENDIAN: Self = Self(1 << 6);
    /// Raw data is DAQmx formatted.
    pub const DAQMX_RAW_DATA: Self = Self(1 << 7);

    /// No flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wraps raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TocFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for TocFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::META_DATA, "META_DATA"),
            (Self::NEW_OBJ_LIST, "NEW_OBJ_LIST"),
            (Self::RAW_DATA, "RAW_DATA"),
            (Self::INTERLEAVED, "INTERLEAVED"),
            (Self::BIG_ENDIAN, "BIG_ENDIAN"),
            (Self::DAQMX_RAW_DATA, "DAQMX_RAW_DATA"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TocFlags({:#x}: {})", self.0, set.join(" | "))
    }
}

/// A decoded lead-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadIn {
    /// Table of contents.
    pub toc: TocFlags,
    /// Format version.
    pub version: u32,
    /// Length of metadata plus raw data; `u64::MAX` if the writer never
    /// finished the segment.
    pub next_segment_offset: u64,
    /// Length of the metadata block.
    pub raw_data_offset: u64,
}

impl LeadIn {
    /// Lead-in for a segment this crate writes.
    #[must_use]
    pub fn new(toc: TocFlags, metadata_len: u64, raw_len: u64) -> Self {
        Self {
            toc,
            version: FORMAT_VERSION,
            next_segment_offset: metadata_len + raw_len,
            raw_data_offset: metadata_len,
        }
    }

    /// Encodes to the fixed 28-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; LEAD_IN_SIZE] {
        let mut out = [0u8; LEAD_IN_SIZE];
        out[0..4].copy_from_slice(&SEGMENT_TAG);
        out[4..8].copy_from_slice(&self.toc.bits().to_le_bytes());
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..20].copy_from_slice(&self.next_segment_offset.to_le_bytes());
        out[20..28].copy_from_slice(&self.raw_data_offset.to_le_bytes());
        out
    }

    /// Decodes a lead-in found at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptFile`] at `offset` if the tag or the
    /// offsets are wrong, and [`CoreError::Unsupported`] for big-endian
    /// or DAQmx segments and unknown versions.
    pub fn decode(bytes: &[u8; LEAD_IN_SIZE], offset: u64) -> CoreResult<Self> {
        if bytes[0..4] != SEGMENT_TAG {
            return Err(CoreError::corrupt(
                offset,
                format!("expected segment tag \"TDSm\", found {:02x?}", &bytes[0..4]),
            ));
        }

        let u32_at = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(raw)
        };
        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let lead_in = Self {
            toc: TocFlags::from_bits(u32_at(4)),
            version: u32_at(8),
            next_segment_offset: u64_at(12),
            raw_data_offset: u64_at(20),
        };

        if lead_in.toc.contains(TocFlags::BIG_ENDIAN) {
            return Err(CoreError::unsupported(format!(
                "big-endian segment at byte {offset}"
            )));
        }
        if lead_in.toc.contains(TocFlags::DAQMX_RAW_DATA) {
            return Err(CoreError::unsupported(format!(
                "DAQmx raw data in segment at byte {offset}"
            )));
        }
        if !(MIN_READ_VERSION..=FORMAT_VERSION).contains(&lead_in.version) {
            return Err(CoreError::unsupported(format!(
                "segment version {} at byte {offset}",
                lead_in.version
            )));
        }
        if !lead_in.is_unterminated() && lead_in.raw_data_offset > lead_in.next_segment_offset {
            return Err(CoreError::corrupt(
                offset,
                format!(
                    "raw data offset {} exceeds segment length {}",
                    lead_in.raw_data_offset, lead_in.next_segment_offset
                ),
            ));
        }

        Ok(lead_in)
    }

    /// Returns whether the writer left the segment length unset.
    #[must_use]
    pub const fn is_unterminated(&self) -> bool {
        self.next_segment_offset == u64::MAX
    }

    /// Returns whether the segment carries a metadata block.
    #[must_use]
    pub const fn has_metadata(&self) -> bool {
        self.toc.contains(TocFlags::META_DATA)
    }

    /// Returns whether the segment carries raw data.
    #[must_use]
    pub const fn has_raw_data(&self) -> bool {
        self.toc.contains(TocFlags::RAW_DATA)
    }

    /// Returns whether raw data is interleaved.
    #[must_use]
    pub const fn is_interleaved(&self) -> bool {
        self.toc.contains(TocFlags::INTERLEAVED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lead_in_layout() {
        let bytes = LeadIn::new(TocFlags::empty(), 0, 0).encode();
        assert_eq!(&bytes[0..4], b"TDSm");
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &4713u32.to_le_bytes());
        assert!(bytes[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decode_what_was_encoded() {
        let toc = TocFlags::META_DATA | TocFlags::NEW_OBJ_LIST | TocFlags::RAW_DATA;
        let lead_in = LeadIn::new(toc, 120, 800);
        assert_eq!(lead_in.next_segment_offset, 920);
        let decoded = LeadIn::decode(&lead_in.encode(), 0).unwrap();
        assert_eq!(decoded, lead_in);
        assert!(decoded.has_metadata());
        assert!(decoded.has_raw_data());
        assert!(!decoded.is_interleaved());
    }

    #[test]
    fn bad_tag_reports_segment_offset() {
        let mut bytes = LeadIn::new(TocFlags::empty(), 0, 0).encode();
        bytes[0] = b'X';
        let err = LeadIn::decode(&bytes, 4096).unwrap_err();
        assert_eq!(err.corrupt_offset(), Some(4096));
    }

    #[test]
    fn big_endian_rejected() {
        let bytes = LeadIn::new(TocFlags::BIG_ENDIAN, 0, 0).encode();
        assert!(matches!(
            LeadIn::decode(&bytes, 0),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn raw_offset_past_segment_is_corrupt() {
        let mut lead_in = LeadIn::new(TocFlags::META_DATA, 10, 0);
        lead_in.raw_data_offset = 11;
        assert!(matches!(
            LeadIn::decode(&lead_in.encode(), 28),
            Err(CoreError::CorruptFile { offset: 28, .. })
        ));
    }

    #[test]
    fn toc_debug_lists_flags() {
        let toc = TocFlags::RAW_DATA | TocFlags::INTERLEAVED;
        assert_eq!(format!("{toc:?}"), "TocFlags(0x28: RAW_DATA | INTERLEAVED)");
    }
}
