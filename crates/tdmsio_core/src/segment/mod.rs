//! On-disk segment layout.
//!
//! Every segment starts with a fixed 28-byte lead-in, followed by an
//! optional metadata block and an optional raw data block:
//!
//! ```text
//! | "TDSm" (4) | ToC (4) | version (4) | next segment offset (8) | raw data offset (8) |
//! | object count (4) | objects ... |
//! | raw data ... |
//! ```
//!
//! Both offsets are measured from the end of the lead-in. All integers
//! are little-endian.

mod lead_in;
mod metadata;
mod raw;

pub use lead_in::{LeadIn, TocFlags, FORMAT_VERSION, LEAD_IN_SIZE, SEGMENT_TAG};
pub use metadata::{decode_metadata, encode_metadata, ObjectMetadata, RawIndex, RawIndexEntry};
pub use raw::{ChunkedDataEncoder, RawSink};
