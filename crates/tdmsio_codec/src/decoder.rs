//! Little-endian decoder for metadata primitives.

use crate::data_type::DataType;
use crate::error::{CodecError, CodecResult};
use crate::path::ObjectPath;
use crate::value::{PropertyValue, Timestamp};
use bytes::Buf;

/// Decodes a property value written by [`crate::encode_property_value`].
///
/// # Errors
///
/// Returns [`CodecError::UnknownPropertyType`] for an unsupported type
/// code, or a truncation / UTF-8 error.
pub fn decode_property_value(bytes: &[u8]) -> CodecResult<PropertyValue> {
    Decoder::new(bytes).property_value()
}

/// A cursor over metadata bytes.
///
/// Every read checks the remaining length first, so truncated input
/// yields [`CodecError::UnexpectedEof`] rather than a panic.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    rest: &'a [u8],
    len: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            rest: data,
            len: data.len(),
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.len - self.rest.len()
    }

    /// Returns whether all input has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// The unread input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.rest
    }

    fn need(&self, n: usize) -> CodecResult<()> {
        if self.rest.remaining() < n {
            return Err(CodecError::eof(n, self.rest.remaining()));
        }
        Ok(())
    }

    /// Reads a `u8`.
    pub fn u8(&mut self) -> CodecResult<u8> {
        self.need(1)?;
        Ok(self.rest.get_u8())
    }

    /// Reads a `u32`.
    pub fn u32(&mut self) -> CodecResult<u32> {
        self.need(4)?;
        Ok(self.rest.get_u32_le())
    }

    /// Reads an `i32`.
    pub fn i32(&mut self) -> CodecResult<i32> {
        self.need(4)?;
        Ok(self.rest.get_i32_le())
    }

    /// Reads a `u64`.
    pub fn u64(&mut self) -> CodecResult<u64> {
        self.need(8)?;
        Ok(self.rest.get_u64_le())
    }

    /// Reads an `i64`.
    pub fn i64(&mut self) -> CodecResult<i64> {
        self.need(8)?;
        Ok(self.rest.get_i64_le())
    }

    /// Reads an `f32`.
    pub fn f32(&mut self) -> CodecResult<f32> {
        self.need(4)?;
        Ok(self.rest.get_f32_le())
    }

    /// Reads an `f64`.
    pub fn f64(&mut self) -> CodecResult<f64> {
        self.need(8)?;
        Ok(self.rest.get_f64_le())
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> CodecResult<String> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let (text, rest) = self.rest.split_at(len);
        self.rest = rest;
        std::str::from_utf8(text)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads and parses an object path string.
    pub fn path(&mut self) -> CodecResult<ObjectPath> {
        let text = self.string()?;
        ObjectPath::parse(&text)
    }

    /// Reads a timestamp (fractions, then seconds).
    pub fn timestamp(&mut self) -> CodecResult<Timestamp> {
        let fractions = self.u64()?;
        let seconds = self.i64()?;
        Ok(Timestamp::new(seconds, fractions))
    }

    /// Reads a type code and the property payload that follows it.
    pub fn property_value(&mut self) -> CodecResult<PropertyValue> {
        let code = self.u32()?;
        let value = match DataType::from_code(code) {
            Some(DataType::I32) => PropertyValue::I32(self.i32()?),
            Some(DataType::I64) => PropertyValue::I64(self.i64()?),
            Some(DataType::F32) => PropertyValue::F32(self.f32()?),
            Some(DataType::F64) => PropertyValue::F64(self.f64()?),
            Some(DataType::Bool) => PropertyValue::Bool(self.u8()? != 0),
            Some(DataType::String) => PropertyValue::String(self.string()?),
            Some(DataType::Timestamp) => PropertyValue::Timestamp(self.timestamp()?),
            _ => return Err(CodecError::UnknownPropertyType { code }),
        };
        Ok(value)
    }

    /// Reads a named property.
    pub fn property(&mut self) -> CodecResult<(String, PropertyValue)> {
        let name = self.string()?;
        let value = self.property_value()?;
        Ok((name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode_property_value, Encoder};
    use proptest::prelude::*;

    #[test]
    fn decodes_each_supported_type() {
        let values = [
            PropertyValue::I32(-5),
            PropertyValue::I64(1 << 40),
            PropertyValue::F32(1.5),
            PropertyValue::F64(-80.5),
            PropertyValue::Bool(false),
            PropertyValue::from("Random voltage readings."),
            PropertyValue::Timestamp(Timestamp::from_unix(1_700_000_000, 0)),
        ];
        for value in values {
            let bytes = encode_property_value(&value).unwrap();
            assert_eq!(decode_property_value(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn unknown_type_code_fails() {
        let bytes = [0x19, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_property_value(&bytes),
            Err(CodecError::UnknownPropertyType { code: 0x19 })
        );
        // A channel-only type is not a property type here either.
        let bytes = [0x01, 0, 0, 0, 7];
        assert!(matches!(
            decode_property_value(&bytes),
            Err(CodecError::UnknownPropertyType { code: 1 })
        ));
    }

    #[test]
    fn truncated_payload_is_eof() {
        let bytes = [0x04, 0, 0, 0, 1, 2, 3];
        assert_eq!(
            decode_property_value(&bytes),
            Err(CodecError::UnexpectedEof {
                needed: 8,
                available: 3
            })
        );
    }

    #[test]
    fn invalid_utf8_rejected() {
        let bytes = [0x20, 0, 0, 0, 2, 0, 0, 0, 0xC3, 0x28];
        assert_eq!(decode_property_value(&bytes), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn cursor_tracks_position() {
        let mut enc = Encoder::new();
        enc.put_u32(2);
        enc.put_path(&ObjectPath::channel("g", "c")).unwrap();
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.u32().unwrap(), 2);
        assert_eq!(dec.position(), 4);
        assert_eq!(dec.path().unwrap(), ObjectPath::channel("g", "c"));
        assert!(dec.is_empty());
    }

    proptest! {
        #[test]
        fn string_properties_survive(name in ".{0,24}", text in ".{0,64}") {
            let mut enc = Encoder::new();
            enc.put_property(&name, &PropertyValue::String(text.clone())).unwrap();
            let bytes = enc.into_bytes();
            let (n, v) = Decoder::new(&bytes).property().unwrap();
            prop_assert_eq!(n, name);
            prop_assert_eq!(v, PropertyValue::String(text));
        }
    }
}
