//! # tdmsio codec
//!
//! Leaf encodings of the TDMS segment format:
//!
//! - [`PropertyValue`]: a tagged scalar (`u32` type code + payload)
//! - [`DataType`]: the shared type-code table
//! - [`Timestamp`]: seconds since 1904 plus a 2^-64 s fraction
//! - [`ObjectPath`]: `/`, `/'group'`, `/'group'/'channel'`
//! - [`Encoder`] / [`Decoder`]: little-endian primitives for metadata
//!
//! ## Usage
//!
//! ```
//! use tdmsio_codec::{decode_property_value, encode_property_value, PropertyValue};
//!
//! let value = PropertyValue::from("counts");
//! let bytes = encode_property_value(&value).unwrap();
//! assert_eq!(decode_property_value(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod data_type;
mod decoder;
mod encoder;
mod error;
mod path;
mod value;

pub use data_type::DataType;
pub use decoder::{decode_property_value, Decoder};
pub use encoder::{encode_property_value, string_len, Encoder};
pub use error::{CodecError, CodecResult};
pub use path::{ObjectKind, ObjectPath};
pub use value::{PropertyValue, Timestamp, EPOCH_1904_OFFSET};
