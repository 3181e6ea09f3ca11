use std::io::{BufReader, Read, Seek, SeekFrom};

use geom::GeoCoord;
use memmap2::Mmap;

use crate::error::{FileError, Result};
use crate::{FileOffset, COORD_FACTOR};

/// How the file is going to be accessed. Purely a buffering hint; both modes
/// support `seek`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScannerMode {
    Sequential,
    Random,
}

enum Source {
    Buffered(BufReader<fs_err::File>),
    Mapped { map: Mmap, pos: usize },
}

/// Read-only access to one database file.
pub struct FileScanner {
    path: String,
    src: Source,
}

impl FileScanner {
    pub fn open(path: &str, mode: ScannerMode, use_mmap: bool) -> Result<FileScanner> {
        let file = fs_err::File::open(path).map_err(|err| FileError::io(path, "open", err))?;

        let src = if use_mmap {
            // Safety: the database files are written once and never modified
            // while an index or router holds them open.
            let map =
                unsafe { Mmap::map(file.file()) }.map_err(|err| FileError::io(path, "mmap", err))?;
            Source::Mapped { map, pos: 0 }
        } else {
            let capacity = match mode {
                ScannerMode::Sequential => 64 * 1024,
                ScannerMode::Random => 4 * 1024,
            };
            Source::Buffered(BufReader::with_capacity(capacity, file))
        };

        Ok(FileScanner {
            path: path.to_string(),
            src,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pos(&mut self) -> Result<FileOffset> {
        match &mut self.src {
            Source::Buffered(file) => file
                .stream_position()
                .map_err(|err| FileError::io(&self.path, "tell", err)),
            Source::Mapped { pos, .. } => Ok(*pos as FileOffset),
        }
    }

    pub fn seek(&mut self, to: FileOffset) -> Result<()> {
        match &mut self.src {
            Source::Buffered(file) => {
                file.seek(SeekFrom::Start(to))
                    .map_err(|err| FileError::io(&self.path, "seek", err))?;
            }
            Source::Mapped { map, pos } => {
                if to > map.len() as u64 {
                    return Err(FileError::format(
                        &self.path,
                        format!("seek to {} past end of file ({} bytes)", to, map.len()),
                    ));
                }
                *pos = to as usize;
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.src {
            Source::Buffered(file) => file.read_exact(buf).map_err(|err| {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    FileError::eof(&self.path)
                } else {
                    FileError::io(&self.path, "read", err)
                }
            }),
            Source::Mapped { map, pos } => {
                if *pos + buf.len() > map.len() {
                    return Err(FileError::eof(&self.path));
                }
                buf.copy_from_slice(&map[*pos..*pos + buf.len()]);
                *pos += buf.len();
                Ok(())
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            x => Err(FileError::format(
                &self.path,
                format!("invalid bool byte {}", x),
            )),
        }
    }

    pub fn read_varint_u64(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(FileError::format(&self.path, "varint overflows u64"));
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(FileError::format(&self.path, "varint longer than 10 bytes"));
            }
        }
    }

    pub fn read_varint_i64(&mut self) -> Result<i64> {
        let raw = self.read_varint_u64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint_u64()? as usize;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|_| FileError::format(&self.path, "string is not valid UTF-8"))
    }

    /// A fixed-width offset into another file; `width` comes from that file's
    /// preamble.
    pub fn read_file_offset(&mut self, width: u8) -> Result<FileOffset> {
        assert!(width >= 1 && width <= 8);
        let mut buf = [0_u8; 8];
        self.read_exact(&mut buf[0..width as usize])?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Fixed-point latitude/longitude, 1e-7 degree resolution.
    pub fn read_coord(&mut self) -> Result<GeoCoord> {
        let lat_raw = self.read_u32()?;
        let lon_raw = self.read_u32()?;
        Ok(GeoCoord::new(
            f64::from(lat_raw) / COORD_FACTOR - 90.0,
            f64::from(lon_raw) / COORD_FACTOR - 180.0,
        ))
    }

    pub fn close(self) -> Result<()> {
        // Nothing buffered to flush on the read side; dropping the handle is
        // enough. Kept as an explicit operation so pipelines read naturally.
        Ok(())
    }
}
