//! Dump command implementation.

use std::io::{self, BufWriter, Write};
use std::path::Path;
use tdmsio_core::TdmsReader;
use tracing::info;

/// Values decoded per read.
const BATCH: u64 = 64 * 1024;

/// Runs the dump command.
///
/// Prints one value per line, reading the channel in batches so large
/// channels are never held in memory at once.
pub fn run(
    path: &Path,
    group: &str,
    channel: &str,
    start: u64,
    stop: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = TdmsReader::open(path)?;
    let channel = reader.channel(group, channel)?;
    let stop = stop.map_or(channel.len(), |s| s.min(channel.len()));
    if start > stop {
        return Err(format!("start {start} is past stop {stop}").into());
    }
    info!(path = %channel.path(), start, stop, "dumping channel");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut at = start;
    while at < stop {
        let end = (at + BATCH).min(stop);
        let values = channel.slice(at, end)?;
        for i in 0..values.len() {
            if let Some(v) = values.display_value(i) {
                writeln!(out, "{v}")?;
            }
        }
        at = end;
    }
    out.flush()?;
    Ok(())
}
