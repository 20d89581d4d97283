//! Typed property values and the TDMS timestamp.

use crate::data_type::DataType;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1904-01-01T00:00:00Z and the Unix epoch.
pub const EPOCH_1904_OFFSET: i64 = 2_082_844_800;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// A point in time as stored in TDMS: whole seconds since
/// 1904-01-01T00:00:00Z plus a fraction in units of 2^-64 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    seconds: i64,
    fractions: u64,
}

impl Timestamp {
    /// Creates a timestamp from its raw fields.
    #[must_use]
    pub const fn new(seconds: i64, fractions: u64) -> Self {
        Self { seconds, fractions }
    }

    /// Whole seconds since 1904-01-01.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.seconds
    }

    /// Fractional part in units of 2^-64 seconds.
    #[must_use]
    pub const fn fractions(self) -> u64 {
        self.fractions
    }

    /// Builds a timestamp from Unix seconds and nanoseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_unix(seconds: i64, nanos: u32) -> Self {
        let fractions = ((u128::from(nanos) << 64) / NANOS_PER_SECOND) as u64;
        Self {
            seconds: seconds + EPOCH_1904_OFFSET,
            fractions,
        }
    }

    /// Returns Unix seconds and the sub-second nanoseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_unix(self) -> (i64, u32) {
        let nanos = ((u128::from(self.fractions) * NANOS_PER_SECOND) >> 64) as u32;
        (self.seconds - EPOCH_1904_OFFSET, nanos)
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Converts to a UTC date-time, if in chrono's range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let (secs, nanos) = self.to_unix();
        Utc.timestamp_opt(secs, nanos).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_unix(value.timestamp(), value.timestamp_subsec_nanos())
    }
}

impl From<SystemTime> for Timestamp {
    #[allow(clippy::cast_possible_wrap)]
    fn from(value: SystemTime) -> Self {
        match value.duration_since(UNIX_EPOCH) {
            Ok(after) => Self::from_unix(after.as_secs() as i64, after.subsec_nanos()),
            Err(err) => {
                // Borrow a whole second so the nanosecond part stays positive.
                let before = err.duration();
                let nanos = (1_000_000_000 - before.subsec_nanos()) % 1_000_000_000;
                let seconds = before.as_secs() as i64 + i64::from(nanos != 0);
                Self::from_unix(-seconds, nanos)
            }
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}s+{}/2^64 (1904 epoch)", self.seconds, self.fractions),
        }
    }
}

/// A typed property value.
///
/// The set is closed to the types the writer emits; decoding any other
/// type code fails with [`crate::CodecError::UnknownPropertyType`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Single precision float.
    F32(f32),
    /// Double precision float.
    F64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Timestamp.
    Timestamp(Timestamp),
}

impl PropertyValue {
    /// Returns the type code this value is written with.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::I32(_) => DataType::I32,
            Self::I64(_) => DataType::I64,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
            Self::Bool(_) => DataType::Bool,
            Self::String(_) => DataType::String,
            Self::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Exact equality, comparing floats by bit pattern.
    ///
    /// Used to decide whether a property changed since the last segment;
    /// unlike `==` a stored NaN is equal to itself.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `f64` if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(v) => Some(f64::from(*v)),
            Self::I64(v) => Some(*v as f64),
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a timestamp.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Timestamp> for PropertyValue {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v.into())
    }
}
