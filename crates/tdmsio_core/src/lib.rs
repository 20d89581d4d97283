//! # tdmsio core
//!
//! Append-only writer and lazy reader for TDMS channel data.
//!
//! This crate provides:
//! - [`TdmsWriter`]: one atomic segment per write, metadata re-emitted
//!   only when it changes, raw data streamed through a bounded buffer
//! - [`MetadataRegistry`]: per-object state used to compute deltas
//! - [`TdmsReader`]: indexes a file once, then serves channel slices by
//!   reading only the bytes that hold them
//!
//! ## Example
//!
//! ```rust,ignore
//! use tdmsio_core::{ObjectUpdate, TdmsReader, TdmsWriter};
//!
//! let mut writer = TdmsWriter::create("basic.tdms")?;
//! writer.write_segment(&[
//!     ObjectUpdate::group("SensorReadings").with_property("location", "Lab A"),
//!     ObjectUpdate::channel("SensorReadings", "Voltage", vec![0.1f64, 0.4, 0.2])
//!         .with_property("unit_string", "V"),
//! ])?;
//! writer.close()?;
//!
//! let reader = TdmsReader::open("basic.tdms")?;
//! let volts = reader.channel("SensorReadings", "Voltage")?.read_all()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod index;
mod reader;
mod registry;
pub mod segment;
mod stats;
mod types;
mod writer;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use index::{ChannelIndex, ChunkRef, FileIndex, SegmentInfo};
pub use reader::{Channel, Group, TdmsReader};
pub use registry::{MetadataDiff, MetadataRegistry, PendingObject, SegmentPlan};
pub use stats::{StatsSnapshot, WriterStats};
pub use types::{ChannelValues, DataLayout, ObjectUpdate, Properties};
pub use writer::{write_scoped, TdmsWriter};

pub use tdmsio_codec::{DataType, ObjectKind, ObjectPath, PropertyValue, Timestamp};
