//! Benchmark utilities.

use rand::Rng;
use tdmsio_core::{Config, ObjectUpdate, TdmsWriter};
use tdmsio_storage::{InMemoryBackend, StorageBackend};

/// Random samples in `[0, 10)`.
pub fn random_samples(n: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen::<f64>() * 10.0).collect()
}

/// One update per channel, `samples` values each, in group `"Bench"`.
pub fn channel_updates(channels: usize, samples: usize) -> Vec<ObjectUpdate> {
    (0..channels)
        .map(|i| {
            ObjectUpdate::channel("Bench", format!("ch{i}"), random_samples(samples))
                .with_property("unit_string", "V")
        })
        .collect()
}

/// An in-memory store holding `segments` segments of `updates`.
pub fn populated_store(updates: &[ObjectUpdate], segments: usize) -> Box<dyn StorageBackend> {
    let mut writer = TdmsWriter::with_backend(Box::new(InMemoryBackend::new()), Config::default())
        .expect("empty backend");
    for _ in 0..segments {
        writer.write_segment(updates).expect("in-memory write");
    }
    writer.close_into_backend().expect("close")
}
