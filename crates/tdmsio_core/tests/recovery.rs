//! Tests for damaged files: truncation, bad tags, partial opens and tail
//! repair in append mode.

use std::fs::OpenOptions;
use std::path::Path;
use tdmsio_core::{
    ChannelValues, Config, CoreError, ObjectUpdate, TdmsReader, TdmsWriter,
};
use tempfile::tempdir;

/// Writes three segments of four f64 values each and returns the segment
/// offsets.
fn write_three_segments(path: &Path) -> Vec<u64> {
    let mut writer = TdmsWriter::create(path).unwrap();
    let mut offsets = Vec::new();
    for seg in 0..3i32 {
        let base = f64::from(seg) * 4.0;
        offsets.push(
            writer
                .write_segment(&[
                    ObjectUpdate::group("Run").with_property("segment", seg),
                    ObjectUpdate::channel("Run", "Signal", vec![base, base + 1.0, base + 2.0, base + 3.0]),
                ])
                .unwrap(),
        );
    }
    writer.close().unwrap();
    offsets
}

fn truncate(path: &Path, len: u64) {
    OpenOptions::new().write(true).open(path).unwrap().set_len(len).unwrap();
}

#[test]
fn truncated_raw_data_is_reported_at_file_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cut.tdms");
    write_three_segments(&path);
    let cut = std::fs::metadata(&path).unwrap().len() - 5;
    truncate(&path, cut);

    let err = TdmsReader::open(&path).unwrap_err();
    assert!(matches!(err, CoreError::CorruptFile { offset, .. } if offset == cut));
}

#[test]
fn partial_open_keeps_intact_segments() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.tdms");
    let offsets = write_three_segments(&path);
    truncate(&path, offsets[2] + 10);

    let (reader, err) = TdmsReader::open_partial(&path).unwrap();
    assert_eq!(err.and_then(|e| e.corrupt_offset()), Some(offsets[2] + 10));
    assert_eq!(reader.index().segments().len(), 2);
    assert_eq!(reader.index().indexed_len(), offsets[2]);
    assert_eq!(reader.groups(), ["Run"]);
    assert_eq!(reader.channels("Run").unwrap(), ["Signal"]);
    assert_eq!(
        reader.channel("Run", "Signal").unwrap().read_all().unwrap(),
        ChannelValues::F64((0..8i32).map(f64::from).collect())
    );
}

#[test]
fn bad_tag_is_reported_at_segment_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tag.tdms");
    let offsets = write_three_segments(&path);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[offsets[1] as usize..offsets[1] as usize + 4].copy_from_slice(b"XXXX");
    std::fs::write(&path, &bytes).unwrap();

    let err = TdmsReader::open(&path).unwrap_err();
    assert_eq!(err.corrupt_offset(), Some(offsets[1]));

    let (reader, err) = TdmsReader::open_partial(&path).unwrap();
    assert!(err.is_some());
    assert_eq!(reader.channel("Run", "Signal").unwrap().len(), 4);
}

#[test]
fn big_endian_segment_is_unsupported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("be.tdms");
    write_three_segments(&path);

    // Set the big-endian ToC bit on the first segment.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4] |= 1 << 6;
    std::fs::write(&path, &bytes).unwrap();

    let err = TdmsReader::open(&path).unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
}

#[test]
fn append_refuses_damaged_tail_by_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("damaged.tdms");
    write_three_segments(&path);
    let cut = std::fs::metadata(&path).unwrap().len() - 3;
    truncate(&path, cut);

    let err = TdmsWriter::append(&path).unwrap_err();
    assert_eq!(err.corrupt_offset(), Some(cut));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), cut);
}

#[test]
fn append_repairs_truncated_tail_when_enabled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repair.tdms");
    let offsets = write_three_segments(&path);
    truncate(&path, offsets[2] + 40);

    let mut writer =
        TdmsWriter::append_with_config(&path, Config::new().repair_truncated_tail(true)).unwrap();
    assert_eq!(writer.size().unwrap(), offsets[2]);
    writer
        .write_segment(&[ObjectUpdate::channel("Run", "Signal", vec![100.0f64])])
        .unwrap();
    writer.close().unwrap();

    let reader = TdmsReader::open(&path).unwrap();
    assert_eq!(
        reader.channel("Run", "Signal").unwrap().slice(6, 9).unwrap(),
        ChannelValues::F64(vec![6.0, 7.0, 100.0])
    );
}

#[test]
fn every_truncation_point_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sweep.tdms");
    write_three_segments(&path);
    let full = std::fs::read(&path).unwrap();
    let boundaries = {
        let reader = TdmsReader::open(&path).unwrap();
        reader
            .index()
            .segments()
            .iter()
            .map(|s| s.end())
            .collect::<Vec<_>>()
    };

    for len in 1..full.len() as u64 {
        std::fs::write(&path, &full[..len as usize]).unwrap();
        let result = TdmsReader::open(&path);
        if boundaries.contains(&len) {
            assert!(result.is_ok(), "cut at segment boundary {len}");
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.corrupt_offset(), Some(len), "cut at {len}");
        }
    }
}
