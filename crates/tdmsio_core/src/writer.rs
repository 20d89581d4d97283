//! Segment writer.
//!
//! A [`TdmsWriter`] owns its backend for its whole lifetime and appends
//! one segment per [`TdmsWriter::write_segment`] call. Segments are
//! atomic: the registry is only updated once a segment's bytes are in
//! the file, and a failed append is truncated away.
//!
//! ```rust,ignore
//! let mut writer = TdmsWriter::create("run.tdms")?;
//! writer.write_segment(&[
//!     ObjectUpdate::root().with_property("name", "run 1"),
//!     ObjectUpdate::channel("Sensors", "Temp", vec![21.5f64, 21.7]),
//! ])?;
//! writer.close()?;
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::index::FileIndex;
use crate::registry::{MetadataRegistry, PendingObject, SegmentPlan};
use crate::segment::{encode_metadata, ChunkedDataEncoder, LeadIn, LEAD_IN_SIZE};
use crate::stats::WriterStats;
use crate::types::{DataLayout, ObjectUpdate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tdmsio_storage::{FileBackend, StorageBackend};
use tracing::{debug, warn};

/// Appends segments to a TDMS file.
pub struct TdmsWriter {
    /// `None` once closed.
    backend: Option<Box<dyn StorageBackend>>,
    registry: MetadataRegistry,
    encoder: ChunkedDataEncoder,
    config: Config,
    stats: WriterStats,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for TdmsWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TdmsWriter")
            .field("path", &self.path)
            .field("objects", &self.registry.len())
            .field("closed", &self.backend.is_none())
            .finish_non_exhaustive()
    }
}

impl TdmsWriter {
    /// Creates (or truncates) a file and locks it for writing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileLocked`] if another writer holds the file,
    /// or an I/O error.
    pub fn create(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::create_with_config(path, Config::default())
    }

    /// Creates a file with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`TdmsWriter::create`].
    pub fn create_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let backend = if config.create_dirs {
            FileBackend::create_with_dirs(path)
        } else {
            FileBackend::create(path)
        }
        .map_err(CoreError::from_storage_open)?;

        debug!(path = %path.display(), "created file");
        let mut writer = Self::fresh(Box::new(backend), config);
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }

    /// Opens an existing file to append further segments.
    ///
    /// The file is indexed first so that objects already present are
    /// not re-declared.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileLocked`] if another writer holds the file,
    /// or any error met while indexing it.
    pub fn append(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::append_with_config(path, Config::default())
    }

    /// Opens an existing file for appending with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`TdmsWriter::append`].
    pub fn append_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let backend = FileBackend::open_append(path).map_err(CoreError::from_storage_open)?;
        let mut writer = Self::resume(Box::new(backend), config)?;
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }

    /// Writes to an arbitrary backend, resuming after any segments it
    /// already holds.
    ///
    /// # Errors
    ///
    /// Returns any error met while indexing existing content.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        if backend.size()? == 0 {
            Ok(Self::fresh(backend, config))
        } else {
            Self::resume(backend, config)
        }
    }

    fn fresh(backend: Box<dyn StorageBackend>, config: Config) -> Self {
        Self {
            backend: Some(backend),
            registry: MetadataRegistry::new(),
            encoder: ChunkedDataEncoder::new(config.chunk_bytes),
            config,
            stats: WriterStats::new(),
            path: None,
        }
    }

    fn resume(mut backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        let (index, err) = FileIndex::build_partial(&*backend)?;
        if let Some(err) = err {
            let size = backend.size()?;
            let truncated_tail = err.corrupt_offset() == Some(size);
            if !(config.repair_truncated_tail && truncated_tail) {
                return Err(err);
            }
            warn!(
                from = size,
                to = index.indexed_len(),
                error = %err,
                "dropping truncated trailing segment"
            );
            backend.truncate(index.indexed_len())?;
        }

        debug!(
            segments = index.segments().len(),
            size = index.indexed_len(),
            "resuming file"
        );
        let mut writer = Self::fresh(backend, config);
        writer.registry = MetadataRegistry::seed_from_index(&index);
        Ok(writer)
    }

    /// Writes one segment using the configured layout.
    ///
    /// Returns the file offset of the new segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] or [`CoreError::Layout`] before
    /// anything is written, or a storage error after which the file is
    /// rolled back to its previous length.
    pub fn write_segment(&mut self, updates: &[ObjectUpdate]) -> CoreResult<u64> {
        let layout = self.config.layout;
        self.write_segment_with_layout(updates, layout)
    }

    /// Writes one segment with an explicit raw data layout.
    ///
    /// # Errors
    ///
    /// See [`TdmsWriter::write_segment`].
    pub fn write_segment_with_layout(
        &mut self,
        updates: &[ObjectUpdate],
        layout: DataLayout,
    ) -> CoreResult<u64> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| CoreError::invalid_operation("writer is closed"))?;

        let pending = merge_updates(updates)?;
        let plan = self.registry.plan_segment(&pending, layout)?;
        let metadata = if plan.metadata().is_empty() {
            Vec::new()
        } else {
            encode_metadata(plan.metadata())?
        };
        let raw_len = plan.raw_len();
        let lead_in = LeadIn::new(plan.toc(), metadata.len() as u64, raw_len);

        let start = backend.size()?;
        let appended = append_segment(
            backend.as_mut(),
            &mut self.encoder,
            &lead_in,
            &metadata,
            &plan,
            self.config.flush_each_segment,
        );
        if let Err(err) = appended {
            self.stats.record_rollback();
            if let Err(rollback) = backend.truncate(start) {
                warn!(offset = start, error = %rollback, "failed to roll back partial segment");
            }
            return Err(err);
        }

        self.registry.commit(&plan);
        let head_len = (LEAD_IN_SIZE + metadata.len()) as u64;
        self.stats.record_segment(head_len, raw_len, plan.value_count());
        debug!(
            offset = start,
            objects = plan.metadata().len(),
            metadata_len = metadata.len(),
            raw_len,
            "wrote segment"
        );
        Ok(start)
    }

    /// The metadata registry.
    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Write statistics.
    #[must_use]
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the file, if writing to one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current file size.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed or the size is unreadable.
    pub fn size(&self) -> CoreResult<u64> {
        match &self.backend {
            Some(backend) => Ok(backend.size()?),
            None => Err(CoreError::invalid_operation("writer is closed")),
        }
    }

    /// Flushes buffered data to the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed or the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        match self.backend.as_mut() {
            Some(backend) => Ok(backend.flush()?),
            None => Err(CoreError::invalid_operation("writer is closed")),
        }
    }

    /// Flushes, syncs if configured, and releases the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub fn close(mut self) -> CoreResult<()> {
        match self.backend.take() {
            Some(mut backend) => finish(backend.as_mut(), &self.config),
            None => Ok(()),
        }
    }

    /// Closes the writer and hands back its backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer was closed or the flush fails.
    pub fn close_into_backend(mut self) -> CoreResult<Box<dyn StorageBackend>> {
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| CoreError::invalid_operation("writer is closed"))?;
        finish(backend.as_mut(), &self.config)?;
        Ok(backend)
    }
}

impl Drop for TdmsWriter {
    fn drop(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            if let Err(err) = finish(backend.as_mut(), &self.config) {
                warn!(path = ?self.path, error = %err, "failed to flush writer on drop");
            }
        }
    }
}

fn finish(backend: &mut dyn StorageBackend, config: &Config) -> CoreResult<()> {
    backend.flush()?;
    if config.sync_on_close {
        backend.sync()?;
    }
    Ok(())
}

fn append_segment(
    backend: &mut dyn StorageBackend,
    encoder: &mut ChunkedDataEncoder,
    lead_in: &LeadIn,
    metadata: &[u8],
    plan: &SegmentPlan<'_>,
    flush: bool,
) -> CoreResult<()> {
    let mut head = Vec::with_capacity(LEAD_IN_SIZE + metadata.len());
    head.extend_from_slice(&lead_in.encode());
    head.extend_from_slice(metadata);
    backend.append(&head)?;

    let written = encoder.encode(plan.raw_channels(), plan.layout(), backend)?;
    debug_assert_eq!(written, plan.raw_len());
    if flush {
        backend.flush()?;
    }
    Ok(())
}

/// Folds updates to the same object into one entry, in first-seen order.
fn merge_updates(updates: &[ObjectUpdate]) -> CoreResult<Vec<PendingObject<'_>>> {
    let mut pending: Vec<PendingObject<'_>> = Vec::with_capacity(updates.len());
    let mut positions: HashMap<_, usize> = HashMap::with_capacity(updates.len());

    for update in updates {
        let path = update.path();
        match positions.get(&path) {
            Some(&at) => {
                let entry = &mut pending[at];
                entry.properties.merge(update.properties());
                if let Some(values) = update.values() {
                    if entry.values.is_some() {
                        return Err(CoreError::layout(format!(
                            "values for {path} supplied twice in one segment"
                        )));
                    }
                    entry.values = Some(values);
                }
            }
            None => {
                positions.insert(path.clone(), pending.len());
                pending.push(PendingObject {
                    path,
                    properties: update.properties().clone(),
                    values: update.values(),
                });
            }
        }
    }
    Ok(pending)
}

/// Creates a file, runs `f` with a writer, and closes the writer on every
/// exit path.
///
/// # Errors
///
/// Returns the error from `f`, or from creating or closing the file.
pub fn write_scoped<T>(
    path: impl AsRef<Path>,
    config: Config,
    f: impl FnOnce(&mut TdmsWriter) -> CoreResult<T>,
) -> CoreResult<T> {
    let mut writer = TdmsWriter::create_with_config(path, config)?;
    match f(&mut writer) {
        Ok(value) => {
            writer.close()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = writer.close() {
                warn!(error = %close_err, "failed to close writer after error");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TdmsReader;
    use crate::types::{ChannelValues, Properties};
    use tdmsio_storage::InMemoryBackend;

    fn memory_writer(config: Config) -> TdmsWriter {
        TdmsWriter::with_backend(Box::new(InMemoryBackend::new()), config).unwrap()
    }

    #[test]
    fn empty_update_writes_bare_lead_in() {
        let mut writer = memory_writer(Config::default());
        writer.write_segment(&[]).unwrap();
        assert_eq!(writer.size().unwrap(), 28);
        assert_eq!(writer.stats().empty_segments(), 1);
    }

    #[test]
    fn duplicate_updates_are_merged() {
        let mut writer = memory_writer(Config::default());
        writer
            .write_segment(&[
                ObjectUpdate::group("g").with_property("a", 1),
                ObjectUpdate::channel("g", "c", vec![1i32, 2]),
                ObjectUpdate::group("g").with_property("a", 2).with_property("b", true),
            ])
            .unwrap();
        let props = writer.registry().properties(&crate::ObjectPath::group("g")).unwrap();
        assert_eq!(props, &Properties::new().with("a", 2).with("b", true));
    }

    #[test]
    fn values_twice_is_layout_error() {
        let mut writer = memory_writer(Config::default());
        let err = writer
            .write_segment(&[
                ObjectUpdate::channel("g", "c", vec![1i32]),
                ObjectUpdate::channel("g", "c", vec![2i32]),
            ])
            .unwrap_err();
        assert!(matches!(err, CoreError::Layout { .. }));
        assert_eq!(writer.size().unwrap(), 0);
    }

    #[test]
    fn interleaved_empty_channel_writes_nothing() {
        let mut writer = memory_writer(Config::default());
        let err = writer
            .write_segment_with_layout(
                &[
                    ObjectUpdate::channel("g", "a", Vec::<i32>::new()),
                    ObjectUpdate::channel("g", "b", vec![1i32, 2, 3]),
                ],
                DataLayout::Interleaved,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Layout { .. }));
        assert_eq!(writer.size().unwrap(), 0);
        assert!(writer.registry().is_empty());
    }

    #[test]
    fn failed_append_rolls_back() {
        let backend = InMemoryBackend::with_capacity_limit(200);
        let config = Config::new().chunk_bytes(64);
        let mut writer = TdmsWriter::with_backend(Box::new(backend), config).unwrap();

        writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![0u8; 10])])
            .unwrap();
        let size = writer.size().unwrap();

        let err = writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![0u8; 500])])
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(writer.size().unwrap(), size);
        assert_eq!(writer.stats().rolled_back(), 1);
        assert_eq!(writer.registry().values_written(&crate::ObjectPath::channel("g", "c")), 10);

        // The writer keeps working after a rollback.
        writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![1u8; 10])])
            .unwrap();
        let reader = TdmsReader::from_backend(writer.close_into_backend().unwrap()).unwrap();
        let values = reader.channel("g", "c").unwrap().read_all().unwrap();
        assert_eq!(values.len(), 20);
    }

    #[test]
    fn resumed_writer_skips_known_objects() {
        let mut writer = memory_writer(Config::default());
        writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![1.0f32, 2.0]).with_property("unit_string", "V")])
            .unwrap();
        let backend = writer.close_into_backend().unwrap();

        let mut writer = TdmsWriter::with_backend(backend, Config::default()).unwrap();
        assert_eq!(
            writer.registry().last_index(&crate::ObjectPath::channel("g", "c")).map(|i| i.count),
            Some(2)
        );
        let err = writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![1i8])])
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeConflict { .. }));

        writer
            .write_segment(&[ObjectUpdate::channel("g", "c", vec![3.0f32, 4.0]).with_property("unit_string", "V")])
            .unwrap();
        let reader = TdmsReader::from_backend(writer.close_into_backend().unwrap()).unwrap();
        assert_eq!(
            reader.channel("g", "c").unwrap().read_all().unwrap(),
            ChannelValues::F32(vec![1.0, 2.0, 3.0, 4.0])
        );
        assert_eq!(reader.index().segments()[1].object_count, 1);
    }

    #[test]
    fn close_into_backend_returns_store() {
        let writer = memory_writer(Config::default());
        let backend = writer.close_into_backend().unwrap();
        assert_eq!(backend.size().unwrap(), 0);
    }
}
