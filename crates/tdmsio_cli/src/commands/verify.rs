//! Verify command implementation.

use std::path::Path;
use tdmsio_core::TdmsReader;
use tracing::{info, warn};

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of intact segments.
    pub segments: usize,
    /// Bytes covered by intact segments.
    pub indexed_bytes: u64,
    /// Total file size.
    pub file_size: u64,
    /// Number of channels that hold data.
    pub channels: usize,
    /// Error that stopped indexing, if any.
    pub error: Option<String>,
    /// Offset reported by a corruption error.
    pub corrupt_offset: Option<u64>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying {}", path.display());
    println!();

    let file_size = std::fs::metadata(path)?.len();
    let (reader, err) = TdmsReader::open_partial(path)?;
    let index = reader.index();
    let result = VerifyResult {
        segments: index.segments().len(),
        indexed_bytes: index.indexed_len(),
        file_size,
        channels: index
            .object_paths()
            .filter(|p| index.channel(p).is_some_and(|c| c.data_type().is_some()))
            .count(),
        corrupt_offset: err.as_ref().and_then(|e| e.corrupt_offset()),
        error: err.map(|e| e.to_string()),
    };

    println!("  Segments:      {}", result.segments);
    println!("  Channels:      {}", result.channels);
    println!("  Indexed bytes: {} of {}", result.indexed_bytes, result.file_size);

    println!();
    if result.is_ok() {
        info!(segments = result.segments, "verification passed");
        println!("✓ File verification passed");
        Ok(())
    } else {
        if let Some(error) = &result.error {
            println!("  Error: {error}");
        }
        if let Some(offset) = result.corrupt_offset {
            println!("  Damage at byte {offset}");
        }
        warn!(error = ?result.error, "verification failed");
        println!("✗ File verification failed");
        Err("Verification failed".into())
    }
}
