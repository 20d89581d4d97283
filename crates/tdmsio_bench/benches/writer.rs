//! Segment writer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use tdmsio_bench::channel_updates;
use tdmsio_core::{Config, DataLayout, TdmsWriter};
use tdmsio_storage::InMemoryBackend;
use tempfile::TempDir;

fn memory_writer(config: &Config) -> TdmsWriter {
    TdmsWriter::with_backend(Box::new(InMemoryBackend::new()), config.clone()).unwrap()
}

/// Benchmark one segment of four channels at growing sizes.
fn bench_write_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_segment");

    for samples in [1_000, 10_000, 100_000].iter() {
        let updates = channel_updates(4, *samples);
        group.throughput(Throughput::Bytes((*samples * 4 * 8) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &updates, |b, updates| {
            let config = Config::default();
            b.iter_batched(
                || memory_writer(&config),
                |mut writer| {
                    black_box(writer.write_segment(black_box(updates)).unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark the encode buffer size.
fn bench_chunk_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_bytes");
    let updates = channel_updates(4, 100_000);
    group.throughput(Throughput::Bytes(100_000 * 4 * 8));

    for chunk in [4 * 1024, 64 * 1024, 1024 * 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            let config = Config::new().chunk_bytes(chunk);
            b.iter_batched(
                || memory_writer(&config),
                |mut writer| {
                    writer.write_segment(&updates).unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Contiguous vs interleaved layout.
fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let updates = channel_updates(8, 10_000);

    for layout in [DataLayout::Contiguous, DataLayout::Interleaved] {
        group.bench_function(format!("{layout:?}"), |b| {
            let config = Config::default();
            b.iter_batched(
                || memory_writer(&config),
                |mut writer| {
                    writer.write_segment_with_layout(&updates, layout).unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark appending segments to a real file.
fn bench_file_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_append");
    group.sample_size(20);
    let updates = channel_updates(4, 10_000);

    group.bench_function("segment", |b| {
        let dir = TempDir::new().unwrap();
        let mut writer = TdmsWriter::create(dir.path().join("bench.tdms")).unwrap();
        b.iter(|| {
            black_box(writer.write_segment(&updates).unwrap());
        });
        writer.close().unwrap();
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write_segment,
    bench_chunk_bytes,
    bench_layout,
    bench_file_append
);
criterion_main!(benches);
