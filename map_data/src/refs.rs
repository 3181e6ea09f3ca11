use std::fmt;

use osmio::{FileOffset, FileScanner, FileWriter, Result};

/// Which data file an [`ObjectFileRef`] points into. The discriminants are
/// the on-disk encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefType {
    Node = 0,
    Area = 1,
    Way = 2,
}

impl RefType {
    pub fn from_u8(value: u8) -> Option<RefType> {
        match value {
            0 => Some(RefType::Node),
            1 => Some(RefType::Area),
            2 => Some(RefType::Way),
            _ => None,
        }
    }

    /// How authoritative a reference of this type is as the primary reference
    /// of a region: a boundary area beats a street, a street beats a place
    /// node. Used to suppress duplicate regions.
    pub fn strength(self) -> u8 {
        match self {
            RefType::Node => 0,
            RefType::Way => 1,
            RefType::Area => 2,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RefType::Node => write!(f, "node"),
            RefType::Area => write!(f, "area"),
            RefType::Way => write!(f, "way"),
        }
    }
}

/// A tagged reference to a record in one of the three data files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectFileRef {
    pub typ: RefType,
    pub offset: FileOffset,
}

impl ObjectFileRef {
    pub fn new(typ: RefType, offset: FileOffset) -> ObjectFileRef {
        ObjectFileRef { typ, offset }
    }

    pub fn node(offset: FileOffset) -> ObjectFileRef {
        ObjectFileRef::new(RefType::Node, offset)
    }

    pub fn area(offset: FileOffset) -> ObjectFileRef {
        ObjectFileRef::new(RefType::Area, offset)
    }

    pub fn way(offset: FileOffset) -> ObjectFileRef {
        ObjectFileRef::new(RefType::Way, offset)
    }
}

impl fmt::Display for ObjectFileRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.typ, self.offset)
    }
}

/// Writes a run of object refs as type byte + zigzag delta of the offset
/// against the previous entry, so sorted runs collapse to a byte or two per
/// entry. `reset` starts a fresh delta chain.
pub struct ObjectFileRefStreamWriter {
    last_offset: FileOffset,
}

impl ObjectFileRefStreamWriter {
    pub fn new() -> ObjectFileRefStreamWriter {
        ObjectFileRefStreamWriter { last_offset: 0 }
    }

    pub fn reset(&mut self) {
        self.last_offset = 0;
    }

    pub fn write(&mut self, writer: &mut FileWriter, object: ObjectFileRef) -> Result<()> {
        writer.write_u8(object.typ as u8)?;
        writer.write_varint_i64(object.offset as i64 - self.last_offset as i64)?;
        self.last_offset = object.offset;
        Ok(())
    }
}

impl Default for ObjectFileRefStreamWriter {
    fn default() -> Self {
        ObjectFileRefStreamWriter::new()
    }
}

pub struct ObjectFileRefStreamReader {
    last_offset: FileOffset,
}

impl ObjectFileRefStreamReader {
    pub fn new() -> ObjectFileRefStreamReader {
        ObjectFileRefStreamReader { last_offset: 0 }
    }

    pub fn reset(&mut self) {
        self.last_offset = 0;
    }

    pub fn read(&mut self, scanner: &mut FileScanner) -> anyhow::Result<ObjectFileRef> {
        let raw_type = scanner.read_u8()?;
        let typ = RefType::from_u8(raw_type)
            .ok_or_else(|| anyhow::anyhow!("invalid object type {}", raw_type))?;
        let delta = scanner.read_varint_i64()?;
        let offset = (self.last_offset as i64 + delta) as FileOffset;
        self.last_offset = offset;
        Ok(ObjectFileRef::new(typ, offset))
    }
}

impl Default for ObjectFileRefStreamReader {
    fn default() -> Self {
        ObjectFileRefStreamReader::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmio::ScannerMode;

    #[test]
    fn stream_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.dat").display().to_string();

        let refs = vec![
            ObjectFileRef::way(100),
            ObjectFileRef::way(250),
            ObjectFileRef::area(40), // out of order is fine, deltas are signed
            ObjectFileRef::node(41),
        ];

        let mut writer = FileWriter::create(&path).unwrap();
        let mut stream = ObjectFileRefStreamWriter::new();
        for r in &refs {
            stream.write(&mut writer, *r).unwrap();
        }
        writer.close().unwrap();

        let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false).unwrap();
        let mut stream = ObjectFileRefStreamReader::new();
        for r in &refs {
            assert_eq!(stream.read(&mut scanner).unwrap(), *r);
        }
    }
}
