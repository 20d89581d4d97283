//! The metadata block: object list, raw data indexes and properties.

use crate::error::{CoreError, CoreResult};
use crate::types::Properties;
use tdmsio_codec::{CodecError, DataType, Decoder, Encoder, ObjectPath};

/// Marker: the object has no raw data in this segment.
const NO_RAW_DATA: u32 = 0xFFFF_FFFF;
/// Marker: the raw data index equals the object's previous one.
const SAME_AS_PREVIOUS: u32 = 0x0000_0000;
/// Length of a numeric raw data index, including the length field.
const NUMERIC_INDEX_LEN: u32 = 20;
/// DAQmx format-changing scaler index.
const DAQMX_FORMAT_CHANGING: u32 = 0x6912_0000;
/// DAQmx digital line scaler index.
const DAQMX_DIGITAL_LINE: u32 = 0x6913_0000;

/// Element type and per-chunk value count of a channel in one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawIndex {
    /// Element type.
    pub data_type: DataType,
    /// Values per chunk.
    pub count: u64,
}

impl RawIndex {
    /// Bytes this channel occupies in one chunk, saturating at `u64::MAX`.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.count.saturating_mul(self.element_size())
    }

    /// Bytes this channel occupies in one chunk, or `None` on overflow.
    #[must_use]
    pub fn checked_byte_len(&self) -> Option<u64> {
        self.count.checked_mul(self.element_size())
    }

    /// Width of one element.
    #[must_use]
    pub fn element_size(&self) -> u64 {
        self.data_type.size().unwrap_or(0) as u64
    }
}

/// The raw data index field of one object entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawIndexEntry {
    /// No raw data in this segment.
    None,
    /// Same type and count as this object's previous index.
    SameAsPrevious,
    /// A full index.
    Index(RawIndex),
}

/// One object entry in a metadata block.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    /// Object path.
    pub path: ObjectPath,
    /// Raw data index.
    pub raw_index: RawIndexEntry,
    /// Properties written in this segment.
    pub properties: Properties,
}

/// Encodes a metadata block.
///
/// # Errors
///
/// Returns [`CoreError::Format`] if a string does not fit a `u32` length,
/// and [`CoreError::Layout`] for more objects or properties than a `u32`
/// count holds.
pub fn encode_metadata(objects: &[ObjectMetadata]) -> CoreResult<Vec<u8>> {
    let mut enc = Encoder::with_capacity(64 * objects.len() + 4);
    enc.put_u32(count_u32(objects.len(), "objects")?);

    for object in objects {
        enc.put_path(&object.path)?;
        match object.raw_index {
            RawIndexEntry::None => enc.put_u32(NO_RAW_DATA),
            RawIndexEntry::SameAsPrevious => enc.put_u32(SAME_AS_PREVIOUS),
            RawIndexEntry::Index(index) => {
                enc.put_u32(NUMERIC_INDEX_LEN);
                enc.put_u32(index.data_type.code());
                enc.put_u32(1);
                enc.put_u64(index.count);
            }
        }
        enc.put_u32(count_u32(object.properties.len(), "properties")?);
        for (name, value) in object.properties.iter() {
            enc.put_property(name, value)?;
        }
    }

    Ok(enc.into_bytes())
}

fn count_u32(n: usize, what: &str) -> CoreResult<u32> {
    u32::try_from(n).map_err(|_| CoreError::layout(format!("{n} {what} in one segment")))
}

/// Decodes a metadata block that starts at byte `offset` of the file.
///
/// # Errors
///
/// Returns [`CoreError::CorruptFile`] if the block ends early,
/// [`CoreError::Format`] for malformed paths, strings or property tags,
/// and [`CoreError::Unsupported`] for string, DAQmx or multi-dimensional
/// raw data.
pub fn decode_metadata(bytes: &[u8], offset: u64) -> CoreResult<Vec<ObjectMetadata>> {
    let mut dec = Decoder::new(bytes);
    decode_objects(&mut dec).map_err(|err| match err {
        CoreError::Format(CodecError::UnexpectedEof { needed, available }) => CoreError::corrupt(
            offset + dec.position() as u64,
            format!("metadata ends early: needed {needed} bytes, {available} left"),
        ),
        other => other,
    })
}

fn decode_objects(dec: &mut Decoder<'_>) -> CoreResult<Vec<ObjectMetadata>> {
    let count = dec.u32()? as usize;
    // Every entry takes at least 12 bytes; cap the allocation accordingly.
    let mut objects = Vec::with_capacity(count.min(dec.remaining().len() / 12));

    for _ in 0..count {
        let path = dec.path()?;
        let raw_index = decode_raw_index(dec, &path)?;
        let prop_count = dec.u32()?;
        let mut properties = Properties::new();
        for _ in 0..prop_count {
            let (name, value) = dec.property()?;
            properties.set(name, value);
        }
        objects.push(ObjectMetadata {
            path,
            raw_index,
            properties,
        });
    }

    Ok(objects)
}

fn decode_raw_index(dec: &mut Decoder<'_>, path: &ObjectPath) -> CoreResult<RawIndexEntry> {
    let len = dec.u32()?;
    match len {
        NO_RAW_DATA => return Ok(RawIndexEntry::None),
        SAME_AS_PREVIOUS => return Ok(RawIndexEntry::SameAsPrevious),
        DAQMX_FORMAT_CHANGING | DAQMX_DIGITAL_LINE => {
            return Err(CoreError::unsupported(format!("DAQmx raw data on {path}")))
        }
        _ => {}
    }

    let code = dec.u32()?;
    let data_type =
        DataType::from_code(code).ok_or(CodecError::UnsupportedDataType { code })?;
    if !data_type.is_channel_type() {
        return Err(CoreError::unsupported(format!(
            "{data_type} channel data on {path}"
        )));
    }
    if len != NUMERIC_INDEX_LEN {
        return Err(CoreError::unsupported(format!(
            "raw data index of {len} bytes on {path}"
        )));
    }
    let dimension = dec.u32()?;
    if dimension != 1 {
        return Err(CoreError::unsupported(format!(
            "{dimension}-dimensional raw data on {path}"
        )));
    }
    let count = dec.u64()?;

    Ok(RawIndexEntry::Index(RawIndex { data_type, count }))
}
