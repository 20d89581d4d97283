//! Values and updates handed to the writer and returned by the reader.

use crate::error::{CoreError, CoreResult};
use tdmsio_codec::{DataType, ObjectPath, PropertyValue};

/// How multi-channel raw data is arranged inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataLayout {
    /// Each channel's values back to back.
    #[default]
    Contiguous,
    /// One value per channel per row.
    Interleaved,
}

/// A fixed-width element that can be stored in a channel.
pub(crate) trait Element: Copy {
    const SIZE: usize;
    fn put(self, out: &mut Vec<u8>);
    /// Reads one element from the front of `bytes` (at least `SIZE` long).
    fn get(bytes: &[u8]) -> Self;
}

macro_rules! numeric_element {
    ($($ty:ty),*) => {$(
        impl Element for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn put(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn get(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::SIZE]);
                <$ty>::from_le_bytes(raw)
            }
        }
    )*};
}

numeric_element!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl Element for bool {
    const SIZE: usize = 1;

    fn put(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn get(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

fn put_range<T: Element>(values: &[T], start: usize, end: usize, out: &mut Vec<u8>) {
    for v in &values[start..end] {
        v.put(out);
    }
}

fn get_strided<T: Element>(values: &mut Vec<T>, bytes: &[u8], count: usize, stride: usize) {
    values.extend((0..count).map(|i| T::get(&bytes[i * stride..])));
}

/// A typed array of channel values.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    /// `i8` samples.
    I8(Vec<i8>),
    /// `i16` samples.
    I16(Vec<i16>),
    /// `i32` samples.
    I32(Vec<i32>),
    /// `i64` samples.
    I64(Vec<i64>),
    /// `u8` samples.
    U8(Vec<u8>),
    /// `u16` samples.
    U16(Vec<u16>),
    /// `u32` samples.
    U32(Vec<u32>),
    /// `u64` samples.
    U64(Vec<u64>),
    /// `f32` samples.
    F32(Vec<f32>),
    /// `f64` samples.
    F64(Vec<f64>),
    /// Boolean samples, one byte each on disk.
    Bool(Vec<bool>),
}

/// Dispatches `$body` with `$v` bound to the inner vector.
macro_rules! each_variant {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            ChannelValues::I8($v) => $body,
            ChannelValues::I16($v) => $body,
            ChannelValues::I32($v) => $body,
            ChannelValues::I64($v) => $body,
            ChannelValues::U8($v) => $body,
            ChannelValues::U16($v) => $body,
            ChannelValues::U32($v) => $body,
            ChannelValues::U64($v) => $body,
            ChannelValues::F32($v) => $body,
            ChannelValues::F64($v) => $body,
            ChannelValues::Bool($v) => $body,
        }
    };
}

impl ChannelValues {
    /// Creates an empty array of `data_type` with room for `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unsupported`] for string and timestamp types.
    pub fn with_capacity(data_type: DataType, capacity: usize) -> CoreResult<Self> {
        let values = match data_type {
            DataType::I8 => Self::I8(Vec::with_capacity(capacity)),
            DataType::I16 => Self::I16(Vec::with_capacity(capacity)),
            DataType::I32 => Self::I32(Vec::with_capacity(capacity)),
            DataType::I64 => Self::I64(Vec::with_capacity(capacity)),
            DataType::U8 => Self::U8(Vec::with_capacity(capacity)),
            DataType::U16 => Self::U16(Vec::with_capacity(capacity)),
            DataType::U32 => Self::U32(Vec::with_capacity(capacity)),
            DataType::U64 => Self::U64(Vec::with_capacity(capacity)),
            DataType::F32 => Self::F32(Vec::with_capacity(capacity)),
            DataType::F64 => Self::F64(Vec::with_capacity(capacity)),
            DataType::Bool => Self::Bool(Vec::with_capacity(capacity)),
            other => {
                return Err(CoreError::unsupported(format!(
                    "{other} is not a channel data type"
                )))
            }
        };
        Ok(values)
    }

    /// Element type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::I8(_) => DataType::I8,
            Self::I16(_) => DataType::I16,
            Self::I32(_) => DataType::I32,
            Self::I64(_) => DataType::I64,
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::U32(_) => DataType::U32,
            Self::U64(_) => DataType::U64,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
            Self::Bool(_) => DataType::Bool,
        }
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    /// Returns whether there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoded width of one value in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        match self {
            Self::I8(_) | Self::U8(_) | Self::Bool(_) => 1,
            Self::I16(_) | Self::U16(_) => 2,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 4,
            Self::I64(_) | Self::U64(_) | Self::F64(_) => 8,
        }
    }

    /// Encoded size of all values in bytes.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        (self.len() * self.element_size()) as u64
    }

    /// Appends the little-endian encoding of values `start..end` to `out`.
    pub(crate) fn encode_range(&self, start: usize, end: usize, out: &mut Vec<u8>) {
        each_variant!(self, v => put_range(v, start, end, out));
    }

    /// Appends values decoded from `bytes`, reading one element every
    /// `stride` bytes.
    pub(crate) fn extend_strided(&mut self, bytes: &[u8], count: usize, stride: usize) {
        each_variant!(self, v => get_strided(v, bytes, count, stride));
    }

    /// Value at `index` widened to `f64`, for display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Self::I8(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I16(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I64(v) => v.get(index).map(|x| *x as f64),
            Self::U8(v) => v.get(index).map(|x| f64::from(*x)),
            Self::U16(v) => v.get(index).map(|x| f64::from(*x)),
            Self::U32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::U64(v) => v.get(index).map(|x| *x as f64),
            Self::F32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::F64(v) => v.get(index).copied(),
            Self::Bool(v) => v.get(index).map(|x| f64::from(u8::from(*x))),
        }
    }

    /// Renders the value at `index` in its natural form.
    #[must_use]
    pub fn display_value(&self, index: usize) -> Option<String> {
        each_variant!(self, v => v.get(index).map(ToString::to_string))
    }

    /// The `f64` samples, if that is the element type.
    #[must_use]
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// The `f32` samples, if that is the element type.
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    /// The `i32` samples, if that is the element type.
    #[must_use]
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// The `i64` samples, if that is the element type.
    #[must_use]
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Self::I64(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! channel_values_from {
    ($($ty:ty => $variant:ident),*) => {$(
        impl From<Vec<$ty>> for ChannelValues {
            fn from(v: Vec<$ty>) -> Self {
                Self::$variant(v)
            }
        }

        impl From<&[$ty]> for ChannelValues {
            fn from(v: &[$ty]) -> Self {
                Self::$variant(v.to_vec())
            }
        }
    )*};
}

channel_values_from!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64, bool => Bool
);

/// An ordered property map; setting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Properties::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a property, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Merges `other` into `self`; values in `other` win.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.entries {
            self.set(k.clone(), v.clone());
        }
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// One object's contribution to a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectUpdate {
    /// File-level properties.
    Root {
        /// Properties to set.
        properties: Properties,
    },
    /// Group properties.
    Group {
        /// Group name.
        name: String,
        /// Properties to set.
        properties: Properties,
    },
    /// Channel properties and, optionally, values to append.
    Channel {
        /// Owning group.
        group: String,
        /// Channel name.
        name: String,
        /// Properties to set.
        properties: Properties,
        /// Values to append in this segment.
        values: Option<ChannelValues>,
    },
}

impl ObjectUpdate {
    /// A root update without properties.
    #[must_use]
    pub fn root() -> Self {
        Self::Root {
            properties: Properties::new(),
        }
    }

    /// A group update without properties.
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    /// A channel update appending `values`.
    pub fn channel(
        group: impl Into<String>,
        name: impl Into<String>,
        values: impl Into<ChannelValues>,
    ) -> Self {
        Self::Channel {
            group: group.into(),
            name: name.into(),
            properties: Properties::new(),
            values: Some(values.into()),
        }
    }

    /// A channel update that only touches properties.
    pub fn channel_metadata(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Channel {
            group: group.into(),
            name: name.into(),
            properties: Properties::new(),
            values: None,
        }
    }

    /// Adds a property to this update.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties_mut().set(name, value);
        self
    }

    /// Replaces this update's properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        *self.properties_mut() = properties;
        self
    }

    /// The object this update targets.
    #[must_use]
    pub fn path(&self) -> ObjectPath {
        match self {
            Self::Root { .. } => ObjectPath::Root,
            Self::Group { name, .. } => ObjectPath::group(name.clone()),
            Self::Channel { group, name, .. } => ObjectPath::channel(group.clone(), name.clone()),
        }
    }

    /// Properties carried by this update.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        match self {
            Self::Root { properties }
            | Self::Group { properties, .. }
            | Self::Channel { properties, .. } => properties,
        }
    }

    fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Self::Root { properties }
            | Self::Group { properties, .. }
            | Self::Channel { properties, .. } => properties,
        }
    }

    /// Values carried by a channel update.
    #[must_use]
    pub fn values(&self) -> Option<&ChannelValues> {
        match self {
            Self::Channel { values, .. } => values.as_ref(),
            _ => None,
        }
    }
}
