//! Per-object metadata state across segments.
//!
//! The registry remembers every object written so far: its merged
//! properties and, for channels, the element type, value count and last
//! raw data index. It is used to emit only what changed in each segment.
//!
//! Writing a segment is split in two so that a failed append leaves the
//! registry untouched:
//!
//! 1. [`MetadataRegistry::plan_segment`] validates the updates and computes
//!    the metadata block without mutating anything.
//! 2. [`MetadataRegistry::commit`] applies the plan once the bytes are in
//!    the file.

use crate::error::{CoreError, CoreResult};
use crate::index::FileIndex;
use crate::segment::{ChunkedDataEncoder, ObjectMetadata, RawIndex, RawIndexEntry, TocFlags};
use crate::types::{ChannelValues, DataLayout, Properties};
use std::collections::HashMap;
use tdmsio_codec::{DataType, ObjectPath};

#[derive(Debug, Clone, Default)]
struct ObjectState {
    properties: Properties,
    channel: Option<ChannelState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    data_type: Option<DataType>,
    values_written: u64,
    last_index: Option<RawIndex>,
}

/// Properties an object must carry in the next segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDiff {
    /// The object has never been written.
    pub is_new: bool,
    /// New or changed properties; all of them for a new object.
    pub properties: Properties,
}

impl MetadataDiff {
    /// Returns whether the object can be left out of the segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_new && self.properties.is_empty()
    }
}

/// One object's merged contribution to a segment.
#[derive(Debug, Clone)]
pub struct PendingObject<'a> {
    /// Object path.
    pub path: ObjectPath,
    /// Properties supplied for this segment.
    pub properties: Properties,
    /// Values to append, for channels.
    pub values: Option<&'a ChannelValues>,
}

/// A validated segment, ready to encode.
#[derive(Debug)]
pub struct SegmentPlan<'a> {
    metadata: Vec<ObjectMetadata>,
    resolved: Vec<Option<RawIndex>>,
    raw_channels: Vec<&'a ChannelValues>,
    layout: DataLayout,
}

impl<'a> SegmentPlan<'a> {
    /// Object entries of the metadata block.
    #[must_use]
    pub fn metadata(&self) -> &[ObjectMetadata] {
        &self.metadata
    }

    /// Channel arrays in raw data order.
    #[must_use]
    pub fn raw_channels(&self) -> &[&'a ChannelValues] {
        &self.raw_channels
    }

    /// Raw data layout.
    #[must_use]
    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// Raw data length in bytes.
    #[must_use]
    pub fn raw_len(&self) -> u64 {
        ChunkedDataEncoder::encoded_len(&self.raw_channels)
    }

    /// Number of channel values in the segment.
    #[must_use]
    pub fn value_count(&self) -> u64 {
        self.raw_channels.iter().map(|c| c.len() as u64).sum()
    }

    /// Returns whether the segment is a bare lead-in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.raw_channels.is_empty()
    }

    /// Table of contents for the lead-in.
    #[must_use]
    pub fn toc(&self) -> TocFlags {
        let mut toc = TocFlags::empty();
        if !self.metadata.is_empty() {
            toc = toc | TocFlags::META_DATA | TocFlags::NEW_OBJ_LIST;
        }
        if self.raw_len() > 0 {
            toc = toc | TocFlags::RAW_DATA;
            if self.layout == DataLayout::Interleaved {
                toc = toc | TocFlags::INTERLEAVED;
            }
        }
        toc
    }
}

/// Tracks what has been written for every object.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    objects: HashMap<ObjectPath, ObjectState>,
    order: Vec<ObjectPath>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from an indexed file.
    #[must_use]
    pub fn seed_from_index(index: &FileIndex) -> Self {
        let mut registry = Self::new();
        for path in index.object_paths() {
            let mut state = ObjectState {
                properties: index.properties(path).cloned().unwrap_or_default(),
                channel: None,
            };
            if let Some(channel) = index.channel(path) {
                state.channel = Some(ChannelState {
                    data_type: channel.data_type(),
                    values_written: channel.len(),
                    last_index: channel.last_index(),
                });
            }
            registry.order.push(path.clone());
            registry.objects.insert(path.clone(), state);
        }
        registry
    }

    /// Creates or merges an object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] if `value_type` differs from the
    /// channel's type, and [`CoreError::InvalidOperation`] for a value
    /// type on a root or group path.
    pub fn register_or_update(
        &mut self,
        path: &ObjectPath,
        properties: &Properties,
        value_type: Option<DataType>,
    ) -> CoreResult<()> {
        if let Some(ty) = value_type {
            self.check_type(path, ty)?;
        }
        let state = self.entry(path);
        state.properties.merge(properties);
        if let (Some(channel), Some(ty)) = (state.channel.as_mut(), value_type) {
            channel.data_type = Some(ty);
        }
        Ok(())
    }

    /// Properties that are new or changed relative to what was written.
    #[must_use]
    pub fn diff_for_segment(&self, path: &ObjectPath, properties: &Properties) -> MetadataDiff {
        match self.objects.get(path) {
            None => MetadataDiff {
                is_new: true,
                properties: properties.clone(),
            },
            Some(state) => MetadataDiff {
                is_new: false,
                properties: properties
                    .iter()
                    .filter(|(k, v)| !state.properties.get(k).is_some_and(|old| old.same_as(v)))
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            },
        }
    }

    /// Checks that `path` may hold values of `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] or, for non-channel paths and
    /// non-channel types, [`CoreError::InvalidOperation`].
    pub fn check_type(&self, path: &ObjectPath, ty: DataType) -> CoreResult<()> {
        if !path.is_channel() {
            return Err(CoreError::invalid_operation(format!(
                "{path} is not a channel and cannot hold values"
            )));
        }
        if !ty.is_channel_type() {
            return Err(CoreError::unsupported(format!("{ty} channel data on {path}")));
        }
        match self.data_type(path) {
            Some(expected) if expected != ty => Err(CoreError::type_conflict(path, expected, ty)),
            _ => Ok(()),
        }
    }

    /// Validates one segment's objects and computes its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] for a channel whose values
    /// change type, and [`CoreError::Layout`] for interleaved channels of
    /// different lengths.
    pub fn plan_segment<'a>(
        &self,
        pending: &[PendingObject<'a>],
        layout: DataLayout,
    ) -> CoreResult<SegmentPlan<'a>> {
        // Empty arrays count toward the interleaved length check.
        let carrying: Vec<&ChannelValues> = pending.iter().filter_map(|o| o.values).collect();
        ChunkedDataEncoder::check_layout(&carrying, layout)?;

        let mut plan = SegmentPlan {
            metadata: Vec::with_capacity(pending.len()),
            resolved: Vec::with_capacity(pending.len()),
            raw_channels: Vec::new(),
            layout,
        };

        for object in pending {
            let diff = self.diff_for_segment(&object.path, &object.properties);
            let raw = match object.values {
                Some(values) => {
                    self.check_type(&object.path, values.data_type())?;
                    Some(RawIndex {
                        data_type: values.data_type(),
                        count: values.len() as u64,
                    })
                }
                None => None,
            };
            if diff.is_empty() && raw.is_none() {
                continue;
            }

            let raw_index = match raw {
                None => RawIndexEntry::None,
                Some(index) if self.last_index(&object.path) == Some(index) => {
                    RawIndexEntry::SameAsPrevious
                }
                Some(index) => RawIndexEntry::Index(index),
            };
            plan.metadata.push(ObjectMetadata {
                path: object.path.clone(),
                raw_index,
                properties: diff.properties,
            });
            plan.resolved.push(raw);
            if let Some(values) = object.values.filter(|v| !v.is_empty()) {
                plan.raw_channels.push(values);
            }
        }

        Ok(plan)
    }

    /// Applies a plan whose segment has been written.
    pub fn commit(&mut self, plan: &SegmentPlan<'_>) {
        for (object, raw) in plan.metadata.iter().zip(&plan.resolved) {
            let state = self.entry(&object.path);
            state.properties.merge(&object.properties);
            if let (Some(channel), Some(index)) = (state.channel.as_mut(), raw) {
                channel.data_type = Some(index.data_type);
                channel.values_written += index.count;
                channel.last_index = Some(*index);
            }
        }
    }

    fn entry(&mut self, path: &ObjectPath) -> &mut ObjectState {
        if !self.objects.contains_key(path) {
            self.order.push(path.clone());
        }
        self.objects
            .entry(path.clone())
            .or_insert_with(|| ObjectState {
                properties: Properties::new(),
                channel: path.is_channel().then(ChannelState::default),
            })
    }

    /// Returns whether `path` has been written.
    #[must_use]
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path)
    }

    /// Merged properties of `path`.
    #[must_use]
    pub fn properties(&self, path: &ObjectPath) -> Option<&Properties> {
        self.objects.get(path).map(|s| &s.properties)
    }

    /// Element type of a channel, once it has had values.
    #[must_use]
    pub fn data_type(&self, path: &ObjectPath) -> Option<DataType> {
        self.channel_state(path).and_then(|c| c.data_type)
    }

    /// Values written to a channel so far.
    #[must_use]
    pub fn values_written(&self, path: &ObjectPath) -> u64 {
        self.channel_state(path).map_or(0, |c| c.values_written)
    }

    /// The raw data index last written for a channel.
    #[must_use]
    pub fn last_index(&self, path: &ObjectPath) -> Option<RawIndex> {
        self.channel_state(path).and_then(|c| c.last_index)
    }

    fn channel_state(&self, path: &ObjectPath) -> Option<&ChannelState> {
        self.objects.get(path).and_then(|s| s.channel.as_ref())
    }

    /// Object paths in first-written order.
    pub fn paths(&self) -> impl Iterator<Item = &ObjectPath> {
        self.order.iter()
    }

    /// Number of known objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether no object has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdmsio_codec::PropertyValue;

    fn pending<'a>(path: ObjectPath, props: Properties, values: Option<&'a ChannelValues>) -> PendingObject<'a> {
        PendingObject {
            path,
            properties: props,
            values,
        }
    }

    #[test]
    fn first_diff_is_full_set() {
        let registry = MetadataRegistry::new();
        let props = Properties::new().with("a", 1).with("b", "x");
        let diff = registry.diff_for_segment(&ObjectPath::Root, &props);
        assert!(diff.is_new);
        assert_eq!(diff.properties, props);
    }

    #[test]
    fn later_diff_only_has_changes() {
        let mut registry = MetadataRegistry::new();
        let path = ObjectPath::group("g");
        registry
            .register_or_update(&path, &Properties::new().with("a", 1).with("b", "x"), None)
            .unwrap();

        let diff = registry.diff_for_segment(&path, &Properties::new().with("a", 1).with("b", "y"));
        assert!(!diff.is_new);
        assert_eq!(diff.properties, Properties::new().with("b", "y"));

        let diff = registry.diff_for_segment(&path, &Properties::new().with("a", 1));
        assert!(diff.is_empty());
    }

    #[test]
    fn type_conflict_detected() {
        let mut registry = MetadataRegistry::new();
        let path = ObjectPath::channel("g", "c");
        registry
            .register_or_update(&path, &Properties::new(), Some(DataType::F64))
            .unwrap();
        let err = registry
            .register_or_update(&path, &Properties::new(), Some(DataType::I32))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeConflict {
                expected: DataType::F64,
                actual: DataType::I32,
                ..
            }
        ));
    }

    #[test]
    fn values_on_group_rejected() {
        let registry = MetadataRegistry::new();
        let values = ChannelValues::from(vec![1i32]);
        let err = registry
            .plan_segment(
                &[pending(ObjectPath::group("g"), Properties::new(), Some(&values))],
                DataLayout::Contiguous,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn plan_does_not_mutate_until_commit() {
        let mut registry = MetadataRegistry::new();
        let values = ChannelValues::from(vec![1.0f64, 2.0]);
        let path = ObjectPath::channel("g", "c");
        let objects = [pending(path.clone(), Properties::new().with("unit_string", "V"), Some(&values))];

        let plan = registry.plan_segment(&objects, DataLayout::Contiguous).unwrap();
        assert!(registry.is_empty());
        assert_eq!(plan.raw_len(), 16);
        assert!(plan.toc().contains(TocFlags::META_DATA | TocFlags::NEW_OBJ_LIST | TocFlags::RAW_DATA));

        registry.commit(&plan);
        assert_eq!(registry.data_type(&path), Some(DataType::F64));
        assert_eq!(registry.values_written(&path), 2);
        assert_eq!(
            registry.properties(&path).and_then(|p| p.get("unit_string")),
            Some(&PropertyValue::from("V"))
        );
    }

    #[test]
    fn repeated_index_is_same_as_previous() {
        let mut registry = MetadataRegistry::new();
        let path = ObjectPath::channel("g", "c");
        let a = ChannelValues::from(vec![1i16, 2, 3]);
        let b = ChannelValues::from(vec![4i16, 5, 6]);

        let plan = registry
            .plan_segment(&[pending(path.clone(), Properties::new(), Some(&a))], DataLayout::Contiguous)
            .unwrap();
        registry.commit(&plan);

        let plan = registry
            .plan_segment(&[pending(path.clone(), Properties::new(), Some(&b))], DataLayout::Contiguous)
            .unwrap();
        assert_eq!(plan.metadata()[0].raw_index, RawIndexEntry::SameAsPrevious);
        registry.commit(&plan);
        assert_eq!(registry.values_written(&path), 6);
    }

    #[test]
    fn unchanged_objects_are_omitted() {
        let mut registry = MetadataRegistry::new();
        let objects = [pending(ObjectPath::Root, Properties::new().with("name", "f"), None)];
        let plan = registry.plan_segment(&objects, DataLayout::Contiguous).unwrap();
        registry.commit(&plan);

        let plan = registry.plan_segment(&objects, DataLayout::Contiguous).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.toc(), TocFlags::empty());
    }

    #[test]
    fn interleaved_lengths_must_match() {
        let registry = MetadataRegistry::new();
        let a = ChannelValues::from(vec![0i32; 10]);
        let b = ChannelValues::from(vec![0i32; 9]);
        let err = registry
            .plan_segment(
                &[
                    pending(ObjectPath::channel("g", "a"), Properties::new(), Some(&a)),
                    pending(ObjectPath::channel("g", "b"), Properties::new(), Some(&b)),
                ],
                DataLayout::Interleaved,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Layout { .. }));
    }

    #[test]
    fn interleaved_empty_array_beside_values_is_layout_error() {
        let registry = MetadataRegistry::new();
        let a = ChannelValues::from(Vec::<i32>::new());
        let b = ChannelValues::from(vec![1i32, 2, 3]);
        let err = registry
            .plan_segment(
                &[
                    pending(ObjectPath::channel("g", "a"), Properties::new(), Some(&a)),
                    pending(ObjectPath::channel("g", "b"), Properties::new(), Some(&b)),
                ],
                DataLayout::Interleaved,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Layout { .. }));

        let plan = registry
            .plan_segment(
                &[
                    pending(ObjectPath::channel("g", "a"), Properties::new(), Some(&a)),
                    pending(ObjectPath::channel("g", "b"), Properties::new(), Some(&b)),
                ],
                DataLayout::Contiguous,
            )
            .unwrap();
        assert_eq!(plan.raw_len(), 12);
    }
}
