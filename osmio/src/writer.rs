use std::io::{BufWriter, Seek, SeekFrom, Write};

use geom::GeoCoord;

use crate::error::{FileError, Result};
use crate::{FileOffset, COORD_FACTOR};

/// Obligation to patch a reserved 8-byte file offset before the writer
/// closes.
#[must_use = "a reserved offset must be patched before the writer closes"]
pub struct OffsetPatch {
    at: FileOffset,
}

/// Obligation to patch a reserved u32 before the writer closes.
#[must_use = "a reserved u32 must be patched before the writer closes"]
pub struct U32Patch {
    at: FileOffset,
}

/// Write access to one database file. The writer owns its file exclusively
/// for the duration of a build phase.
///
/// Values that are only known later (child skip offsets, data section
/// positions, tile tables) are reserved with `reserve_*`, which hands back a
/// patch obligation. `close` panics if any obligation is still outstanding;
/// that's a builder bug, not an I/O failure.
pub struct FileWriter {
    path: String,
    file: BufWriter<fs_err::File>,
    pos: FileOffset,
    outstanding_patches: usize,
}

impl FileWriter {
    pub fn create(path: &str) -> Result<FileWriter> {
        let file = fs_err::File::create(path).map_err(|err| FileError::io(path, "create", err))?;
        Ok(FileWriter {
            path: path.to_string(),
            file: BufWriter::new(file),
            pos: 0,
            outstanding_patches: 0,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The position the next `write_*` will land at.
    pub fn pos(&self) -> FileOffset {
        self.pos
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.file
            .write_all(buf)
            .map_err(|err| FileError::io(&self.path, "write", err))?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(if value { 1 } else { 0 })
    }

    pub fn write_varint_u64(&mut self, mut value: u64) -> Result<()> {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }

    pub fn write_varint_i64(&mut self, value: i64) -> Result<()> {
        self.write_varint_u64(((value << 1) ^ (value >> 63)) as u64)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_varint_u64(value.len() as u64)?;
        self.write_all(value.as_bytes())
    }

    pub fn write_file_offset(&mut self, value: FileOffset, width: u8) -> Result<()> {
        assert!(width >= 1 && width <= 8);
        if width < 8 && value >> (width * 8) != 0 {
            return Err(FileError::format(
                &self.path,
                format!("offset {} doesn't fit into {} bytes", value, width),
            ));
        }
        let bytes = value.to_le_bytes();
        self.write_all(&bytes[0..width as usize])
    }

    pub fn write_coord(&mut self, coord: GeoCoord) -> Result<()> {
        self.write_u32(((coord.lat + 90.0) * COORD_FACTOR).round() as u32)?;
        self.write_u32(((coord.lon + 180.0) * COORD_FACTOR).round() as u32)
    }

    /// Writes an 8-byte placeholder and returns the obligation to fill it in.
    pub fn reserve_file_offset(&mut self) -> Result<OffsetPatch> {
        let at = self.pos;
        self.write_u64(0)?;
        self.outstanding_patches += 1;
        Ok(OffsetPatch { at })
    }

    /// Writes a 4-byte placeholder and returns the obligation to fill it in.
    pub fn reserve_u32(&mut self) -> Result<U32Patch> {
        let at = self.pos;
        self.write_u32(0)?;
        self.outstanding_patches += 1;
        Ok(U32Patch { at })
    }

    fn patch_at(&mut self, at: FileOffset, bytes: &[u8]) -> Result<()> {
        let resume = self.pos;
        self.file
            .seek(SeekFrom::Start(at))
            .map_err(|err| FileError::io(&self.path, "seek", err))?;
        self.file
            .write_all(bytes)
            .map_err(|err| FileError::io(&self.path, "write", err))?;
        self.file
            .seek(SeekFrom::Start(resume))
            .map_err(|err| FileError::io(&self.path, "seek", err))?;
        self.outstanding_patches -= 1;
        Ok(())
    }

    pub fn patch_file_offset(&mut self, patch: OffsetPatch, value: FileOffset) -> Result<()> {
        self.patch_at(patch.at, &value.to_le_bytes())
    }

    pub fn patch_u32(&mut self, patch: U32Patch, value: u32) -> Result<()> {
        self.patch_at(patch.at, &value.to_le_bytes())
    }

    pub fn close(mut self) -> Result<()> {
        assert!(
            self.outstanding_patches == 0,
            "closing '{}' with {} outstanding patch(es)",
            self.path,
            self.outstanding_patches
        );
        self.file
            .flush()
            .map_err(|err| FileError::io(&self.path, "flush", err))
    }

    /// Abort path: drop whatever was buffered and remove the partial output,
    /// so a retry starts from a clean state. Never fails.
    pub fn close_failsafe(self) {
        let path = self.path.clone();
        drop(self);
        if fs_err::remove_file(&path).is_ok() {
            warn!("Removed partially written {}", path);
        }
    }
}
