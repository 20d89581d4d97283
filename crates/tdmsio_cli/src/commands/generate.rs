//! Generate command implementation.
//!
//! Writes the demonstration files: a small single-segment file, a mixed
//! type interleaved file, and a large file written one segment per chunk.

use crate::Kind;
use rand::Rng;
use std::f64::consts::TAU;
use std::path::Path;
use tdmsio_core::{write_scoped, Config, DataLayout, ObjectUpdate, StatsSnapshot, TdmsWriter, Timestamp};
use tracing::{debug, info};

/// Runs the generate command.
pub fn run(path: &Path, kind: Kind, chunks: u64, chunk_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), ?kind, "generating file");
    let stats = match kind {
        Kind::Basic => write_scoped(path, Config::default(), basic)?,
        Kind::Interleaved => write_scoped(path, Config::default(), interleaved)?,
        Kind::Large => write_scoped(path, Config::default(), |w| large(w, chunks, chunk_size))?,
    };

    println!("Wrote {}", path.display());
    println!("  Segments:   {}", stats.segments);
    println!("  Values:     {}", stats.values);
    println!("  Total size: {} bytes", stats.total_bytes());
    Ok(())
}

fn random_volts(n: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen::<f64>() * 10.0).collect()
}

/// `n` evenly spaced points from `from` to `to`, both included.
#[allow(clippy::cast_precision_loss)]
fn linspace(from: f64, to: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![from],
        _ => {
            let step = (to - from) / (n - 1) as f64;
            (0..n).map(|i| from + step * i as f64).collect()
        }
    }
}

fn basic(writer: &mut TdmsWriter) -> tdmsio_core::CoreResult<StatsSnapshot> {
    let time = linspace(0.0, TAU, 100);
    let sine: Vec<f64> = time.iter().map(|t| 5.0 * t.sin()).collect();

    writer.write_segment(&[
        ObjectUpdate::root()
            .with_property("author", "tdmsio")
            .with_property("description", "An example TDMS file.")
            .with_property("creation_time", Timestamp::now())
            .with_property("version", 1.0),
        ObjectUpdate::group("Group 1")
            .with_property("group_description", "Simulated sensor readings.")
            .with_property("sensor_id", 12345),
        ObjectUpdate::channel("Group 1", "Counter", (0..100).collect::<Vec<i32>>())
            .with_property("unit_string", "counts")
            .with_property("description", "A simple integer counter.")
            .with_property("is_calibrated", false)
            .with_property("slope", 1.0),
        ObjectUpdate::channel("Group 1", "Random", random_volts(100))
            .with_property("unit_string", "V")
            .with_property("description", "Random voltage readings.")
            .with_property("noise_level_db", -80.5),
        ObjectUpdate::group("Group 2")
            .with_property("group_description", "A generated waveform.")
            .with_property("waveform_type", "Sine"),
        ObjectUpdate::channel("Group 2", "SineWave", sine)
            .with_property("unit_string", "Amplitude")
            .with_property("description", "A generated sine wave.")
            .with_property("frequency_hz", 1.0)
            .with_property("amplitude", 5.0)
            .with_property("offset", 0.0),
        ObjectUpdate::channel("Group 2", "Time", time)
            .with_property("unit_string", "s")
            .with_property("description", "Time vector for the sine wave."),
    ])?;
    Ok(writer.stats().snapshot())
}

fn interleaved(writer: &mut TdmsWriter) -> tdmsio_core::CoreResult<StatsSnapshot> {
    writer.write_segment_with_layout(
        &[
            ObjectUpdate::channel("Group 1", "Channel 1", (0..10).collect::<Vec<i32>>()),
            ObjectUpdate::channel("Group 1", "Channel 2", (0..10i32).map(|i| f64::from(i) * 2.0).collect::<Vec<f64>>()),
        ],
        DataLayout::Interleaved,
    )?;
    Ok(writer.stats().snapshot())
}

#[allow(clippy::cast_precision_loss)]
fn large(writer: &mut TdmsWriter, chunks: u64, chunk_size: usize) -> tdmsio_core::CoreResult<StatsSnapshot> {
    let total = chunks.saturating_mul(chunk_size as u64);
    writer.write_segment(&[
        ObjectUpdate::root()
            .with_property("author", "tdmsio")
            .with_property("description", format!("A large example TDMS file ({total} samples/channel)."))
            .with_property("creation_time", Timestamp::now())
            .with_property("version", 2.0),
        ObjectUpdate::group("SensorReadings")
            .with_property("group_description", "Simulated sensor readings written in chunks.")
            .with_property("sensor_id", 12345),
        ObjectUpdate::group("Waveforms")
            .with_property("group_description", "A generated waveform written in chunks.")
            .with_property("waveform_type", "Sine"),
    ])?;

    for chunk in 0..chunks {
        let first = chunk.saturating_mul(chunk_size as u64);
        // The counter wraps like a 32-bit DAQ counter.
        let counter: Vec<i32> = (0..chunk_size as u64).map(|i| (first + i) as i32).collect();
        let start = chunk as f64 * TAU;
        let time = linspace(start, start + TAU, chunk_size);
        let sine: Vec<f64> = time.iter().map(|t| 5.0 * t.sin()).collect();

        writer.write_segment(&[
            ObjectUpdate::channel("SensorReadings", "Counter", counter)
                .with_property("unit_string", "counts")
                .with_property("description", "A simple integer counter."),
            ObjectUpdate::channel("SensorReadings", "Random", random_volts(chunk_size))
                .with_property("unit_string", "V")
                .with_property("description", "Random voltage readings."),
            ObjectUpdate::channel("Waveforms", "SineWave", sine)
                .with_property("unit_string", "Amplitude")
                .with_property("description", "A generated sine wave."),
            ObjectUpdate::channel("Waveforms", "Time", time)
                .with_property("unit_string", "s")
                .with_property("description", "Time vector for the sine wave."),
        ])?;
        debug!(chunk = chunk + 1, of = chunks, "wrote chunk");
    }
    Ok(writer.stats().snapshot())
}
