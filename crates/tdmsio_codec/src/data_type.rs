//! Type codes shared by properties and raw data indexes.

use std::fmt;

/// A TDMS data type code.
///
/// Channels may use the fixed-width numeric types and `Bool`; `String`
/// and `Timestamp` are only valid as property types in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// Signed 8-bit integer.
    I8 = 0x01,
    /// Signed 16-bit integer.
    I16 = 0x02,
    /// Signed 32-bit integer.
    I32 = 0x03,
    /// Signed 64-bit integer.
    I64 = 0x04,
    /// Unsigned 8-bit integer.
    U8 = 0x05,
    /// Unsigned 16-bit integer.
    U16 = 0x06,
    /// Unsigned 32-bit integer.
    U32 = 0x07,
    /// Unsigned 64-bit integer.
    U64 = 0x08,
    /// IEEE 754 single precision.
    F32 = 0x09,
    /// IEEE 754 double precision.
    F64 = 0x0A,
    /// Length-prefixed UTF-8 string.
    String = 0x20,
    /// One byte, zero is false.
    Bool = 0x21,
    /// 16-byte timestamp (fractions, then seconds since 1904).
    Timestamp = 0x44,
}

impl DataType {
    /// Converts a type code to a data type.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        let ty = match code {
            0x01 => Self::I8,
            0x02 => Self::I16,
            0x03 => Self::I32,
            0x04 => Self::I64,
            0x05 => Self::U8,
            0x06 => Self::U16,
            0x07 => Self::U32,
            0x08 => Self::U64,
            0x09 => Self::F32,
            0x0A => Self::F64,
            0x20 => Self::String,
            0x21 => Self::Bool,
            0x44 => Self::Timestamp,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns the on-disk type code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Returns the encoded width of one element, or `None` for strings.
    #[must_use]
    pub const fn size(self) -> Option<usize> {
        match self {
            Self::I8 | Self::U8 | Self::Bool => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Timestamp => Some(16),
            Self::String => None,
        }
    }

    /// Returns whether channel raw data may use this type.
    #[must_use]
    pub const fn is_channel_type(self) -> bool {
        !matches!(self, Self::String | Self::Timestamp)
    }

    /// Short lowercase name used in listings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in (0x01..=0x0A).chain([0x20, 0x21, 0x44]) {
            let ty = DataType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(DataType::from_code(0x19), None);
        assert_eq!(DataType::from_code(0xFFFF_FFFF), None);
    }

    #[test]
    fn widths() {
        assert_eq!(DataType::Bool.size(), Some(1));
        assert_eq!(DataType::I32.size(), Some(4));
        assert_eq!(DataType::F64.size(), Some(8));
        assert_eq!(DataType::Timestamp.size(), Some(16));
        assert_eq!(DataType::String.size(), None);
    }

    #[test]
    fn channel_types_exclude_strings_and_timestamps() {
        assert!(DataType::U16.is_channel_type());
        assert!(DataType::Bool.is_channel_type());
        assert!(!DataType::String.is_channel_type());
        assert!(!DataType::Timestamp.is_channel_type());
    }
}
