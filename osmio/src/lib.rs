//! Sequential and random binary file access for the map database formats.
//!
//! Every multi-byte integer on disk is little-endian. Unbounded counts use a
//! 7-bits-per-byte varint; strings are varint length-prefixed UTF-8; file
//! offsets referencing another file are fixed-width with a per-file byte
//! count chosen from that file's size (see [`bytes_needed_to_address`]).

#[macro_use]
extern crate log;

mod error;
mod scanner;
mod writer;

pub use crate::error::{FileError, Result};
pub use crate::scanner::{FileScanner, ScannerMode};
pub use crate::writer::{FileWriter, OffsetPatch, U32Patch};

/// A position in one of the database files.
pub type FileOffset = u64;

/// Number of bytes a fixed-width offset into the given file needs. The result
/// is stored in file preambles so readers agree with writers.
pub fn bytes_needed_to_address(path: &str) -> Result<u8> {
    let len = fs_err::metadata(path)
        .map_err(|err| FileError::io(path, "metadata", err))?
        .len();

    let mut bytes = 1;
    let mut max = 0xff_u64;
    while len > max {
        bytes += 1;
        max = (max << 8) | 0xff;
    }
    Ok(bytes)
}

pub(crate) const COORD_FACTOR: f64 = 10_000_000.0;

#[cfg(test)]
mod tests {
    use super::*;
    use geom::GeoCoord;

    #[test]
    fn roundtrip_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalars.dat").display().to_string();

        let mut writer = FileWriter::create(&path).unwrap();
        writer.write_u8(0x12).unwrap();
        writer.write_u16(0x3456).unwrap();
        writer.write_u32(0x789a_bcde).unwrap();
        writer.write_u64(0x1122_3344_5566_7788).unwrap();
        writer.write_bool(true).unwrap();
        writer.write_varint_u64(300).unwrap();
        writer.write_varint_i64(-7).unwrap();
        writer.write_string("grüße").unwrap();
        writer
            .write_coord(GeoCoord::new(48.137154, 11.576124))
            .unwrap();
        writer.write_file_offset(0xabcd, 3).unwrap();
        writer.close().unwrap();

        let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false).unwrap();
        assert_eq!(scanner.read_u8().unwrap(), 0x12);
        assert_eq!(scanner.read_u16().unwrap(), 0x3456);
        assert_eq!(scanner.read_u32().unwrap(), 0x789a_bcde);
        assert_eq!(scanner.read_u64().unwrap(), 0x1122_3344_5566_7788);
        assert!(scanner.read_bool().unwrap());
        assert_eq!(scanner.read_varint_u64().unwrap(), 300);
        assert_eq!(scanner.read_varint_i64().unwrap(), -7);
        assert_eq!(scanner.read_string().unwrap(), "grüße");
        let c = scanner.read_coord().unwrap();
        assert!((c.lat - 48.137154).abs() < 1e-6);
        assert!((c.lon - 11.576124).abs() < 1e-6);
        assert_eq!(scanner.read_file_offset(3).unwrap(), 0xabcd);
        match scanner.read_u8() {
            Err(FileError::Eof { .. }) => {}
            other => panic!("expected EOF, got {:?}", other),
        }
    }

    #[test]
    fn varint_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("varint.dat").display().to_string();

        let values = vec![0, 1, 127, 128, 16_383, 16_384, u64::MAX];
        let mut writer = FileWriter::create(&path).unwrap();
        for v in &values {
            writer.write_varint_u64(*v).unwrap();
        }
        writer.close().unwrap();

        let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, true).unwrap();
        for v in &values {
            assert_eq!(scanner.read_varint_u64().unwrap(), *v);
        }
    }

    #[test]
    fn backpatching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.dat").display().to_string();

        let mut writer = FileWriter::create(&path).unwrap();
        let header = writer.reserve_file_offset().unwrap();
        let count = writer.reserve_u32().unwrap();
        writer.write_u8(42).unwrap();
        let payload_start = writer.pos();
        writer.patch_file_offset(header, payload_start).unwrap();
        writer.patch_u32(count, 7).unwrap();
        assert_eq!(writer.pos(), payload_start);
        writer.write_u8(43).unwrap();
        writer.close().unwrap();

        let mut scanner = FileScanner::open(&path, ScannerMode::Random, false).unwrap();
        assert_eq!(scanner.read_u64().unwrap(), payload_start);
        assert_eq!(scanner.read_u32().unwrap(), 7);
        assert_eq!(scanner.read_u8().unwrap(), 42);
        assert_eq!(scanner.read_u8().unwrap(), 43);
    }

    #[test]
    #[should_panic(expected = "outstanding patch")]
    fn unconsumed_patch_panics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leak.dat").display().to_string();

        let mut writer = FileWriter::create(&path).unwrap();
        let _patch = writer.reserve_file_offset().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn offset_widths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.dat").display().to_string();
        let mut writer = FileWriter::create(&path).unwrap();
        writer.write_u32(0).unwrap();
        writer.close().unwrap();
        assert_eq!(bytes_needed_to_address(&path).unwrap(), 1);
    }
}
