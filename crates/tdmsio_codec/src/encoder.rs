//! Little-endian encoder for metadata primitives.

use crate::error::{CodecError, CodecResult};
use crate::path::ObjectPath;
use crate::value::{PropertyValue, Timestamp};
use bytes::BufMut;

/// Encodes a property value as `u32 type code` followed by its payload.
///
/// # Errors
///
/// Returns [`CodecError::StringTooLong`] for strings over 4 GiB.
pub fn encode_property_value(value: &PropertyValue) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.put_property_value(value)?;
    Ok(encoder.into_bytes())
}

/// Number of bytes [`Encoder::put_string`] writes for `s`.
#[must_use]
pub fn string_len(s: &str) -> usize {
    4 + s.len()
}

/// Builds metadata bytes in the little-endian TDMS layout.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with preallocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Consumes the encoder and returns the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes a `u32`.
    pub fn put_u32(&mut self, v: u32) {
        self.buffer.put_u32_le(v);
    }

    /// Writes a `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.buffer.put_u64_le(v);
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::StringTooLong`] if the length overflows `u32`.
    pub fn put_string(&mut self, s: &str) -> CodecResult<()> {
        let len = u32::try_from(s.len()).map_err(|_| CodecError::StringTooLong { len: s.len() })?;
        self.buffer.put_u32_le(len);
        self.buffer.put_slice(s.as_bytes());
        Ok(())
    }

    /// Writes an object path in its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::StringTooLong`] for oversized names.
    pub fn put_path(&mut self, path: &ObjectPath) -> CodecResult<()> {
        self.put_string(&path.to_string())
    }

    /// Writes a timestamp: fractions first, then seconds.
    pub fn put_timestamp(&mut self, ts: Timestamp) {
        self.buffer.put_u64_le(ts.fractions());
        self.buffer.put_i64_le(ts.seconds());
    }

    /// Writes a property value with its type code.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::StringTooLong`] for oversized strings.
    pub fn put_property_value(&mut self, value: &PropertyValue) -> CodecResult<()> {
        self.buffer.put_u32_le(value.data_type().code());
        match value {
            PropertyValue::I32(v) => self.buffer.put_i32_le(*v),
            PropertyValue::I64(v) => self.buffer.put_i64_le(*v),
            PropertyValue::F32(v) => self.buffer.put_f32_le(*v),
            PropertyValue::F64(v) => self.buffer.put_f64_le(*v),
            PropertyValue::Bool(v) => self.buffer.put_u8(u8::from(*v)),
            PropertyValue::String(v) => self.put_string(v)?,
            PropertyValue::Timestamp(v) => self.put_timestamp(*v),
        }
        Ok(())
    }

    /// Writes a named property.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::StringTooLong`] for oversized strings.
    pub fn put_property(&mut self, name: &str, value: &PropertyValue) -> CodecResult<()> {
        self.put_string(name)?;
        self.put_property_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_property_layout() {
        let bytes = encode_property_value(&PropertyValue::I32(12345)).unwrap();
        assert_eq!(bytes, [0x03, 0, 0, 0, 0x39, 0x30, 0, 0]);
    }

    #[test]
    fn f64_property_layout() {
        let bytes = encode_property_value(&PropertyValue::F64(2.0)).unwrap();
        assert_eq!(&bytes[..4], &[0x0A, 0, 0, 0]);
        assert_eq!(&bytes[4..], &2.0f64.to_le_bytes());
    }

    #[test]
    fn bool_property_is_one_byte() {
        let bytes = encode_property_value(&PropertyValue::Bool(true)).unwrap();
        assert_eq!(bytes, [0x21, 0, 0, 0, 1]);
    }

    #[test]
    fn string_property_layout() {
        let bytes = encode_property_value(&PropertyValue::from("V")).unwrap();
        assert_eq!(bytes, [0x20, 0, 0, 0, 1, 0, 0, 0, b'V']);
    }

    #[test]
    fn timestamp_fractions_before_seconds() {
        let ts = Timestamp::new(3, 1 << 63);
        let bytes = encode_property_value(&PropertyValue::Timestamp(ts)).unwrap();
        assert_eq!(bytes.len(), 4 + 16);
        assert_eq!(&bytes[4..12], &(1u64 << 63).to_le_bytes());
        assert_eq!(&bytes[12..20], &3i64.to_le_bytes());
    }

    #[test]
    fn named_property_and_path() {
        let mut enc = Encoder::new();
        enc.put_path(&ObjectPath::group("G")).unwrap();
        enc.put_property("unit_string", &PropertyValue::from("s")).unwrap();
        assert_eq!(&enc.as_bytes()[..8], &[4, 0, 0, 0, b'/', b'\'', b'G', b'\'']);
        assert_eq!(enc.len(), 8 + string_len("unit_string") + 4 + string_len("s"));
    }
}
