//! Query-time access to `location.idx`. The header tree is cheap enough to
//! materialize in one go; per-region payloads and address lists load on
//! demand from their recorded offsets.

use anyhow::{bail, Result};
use map_data::{ObjectFileRef, ObjectFileRefStreamReader, RefType};
use osmio::{FileOffset, FileScanner, ScannerMode};

use crate::region::{RegionAddress, RegionAlias, RegionPoi};

/// One region header as stored in the index section.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRegion {
    pub name: String,
    pub reference: ObjectFileRef,
    pub aliases: Vec<RegionAlias>,
    pub index_offset: FileOffset,
    pub parent_index_offset: FileOffset,
    pub data_offset: FileOffset,
    pub regions: Vec<IndexRegion>,
}

impl IndexRegion {
    /// Exact-match lookup of a descendant (or self) by name or alias.
    pub fn find<'a>(&'a self, name: &str) -> Option<&'a IndexRegion> {
        if self.name == name || self.aliases.iter().any(|a| a.name == name) {
            return Some(self);
        }
        self.regions.iter().find_map(|child| child.find(name))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionLocationEntry {
    pub name: String,
    pub objects: Vec<ObjectFileRef>,
    pub addresses_offset: Option<FileOffset>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionData {
    pub pois: Vec<RegionPoi>,
    pub locations: Vec<RegionLocationEntry>,
}

/// The opened index file plus everything from its preamble.
pub struct LocationIndex {
    path: String,
    node_width: u8,
    area_width: u8,
    way_width: u8,
    pub region_ignore_tokens: Vec<String>,
    pub location_ignore_tokens: Vec<String>,
    index_start: FileOffset,
}

impl LocationIndex {
    pub fn load(path: &str) -> Result<LocationIndex> {
        let mut scanner = FileScanner::open(path, ScannerMode::Random, false)?;
        let node_width = scanner.read_u8()?;
        let area_width = scanner.read_u8()?;
        let way_width = scanner.read_u8()?;

        let mut token_lists = Vec::new();
        for _ in 0..2 {
            let count = scanner.read_varint_u64()?;
            let mut tokens = Vec::with_capacity(count as usize);
            for _ in 0..count {
                tokens.push(scanner.read_string()?);
            }
            token_lists.push(tokens);
        }
        let index_start = scanner.pos()?;

        Ok(LocationIndex {
            path: path.to_string(),
            node_width,
            area_width,
            way_width,
            location_ignore_tokens: token_lists.pop().unwrap(),
            region_ignore_tokens: token_lists.pop().unwrap(),
            index_start,
        })
    }

    fn open(&self) -> Result<FileScanner> {
        Ok(FileScanner::open(&self.path, ScannerMode::Random, false)?)
    }

    fn width_for(&self, typ: RefType) -> u8 {
        match typ {
            RefType::Node => self.node_width,
            RefType::Area => self.area_width,
            RefType::Way => self.way_width,
        }
    }

    /// Materializes all region headers.
    pub fn read_region_tree(&self) -> Result<Vec<IndexRegion>> {
        let mut scanner = self.open()?;
        scanner.seek(self.index_start)?;
        self.read_children(&mut scanner)
    }

    fn read_children(&self, scanner: &mut FileScanner) -> Result<Vec<IndexRegion>> {
        let count = scanner.read_varint_u64()?;
        let mut regions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let next_sibling = scanner.read_u64()?;
            regions.push(self.read_region_entry(scanner)?);
            let here = scanner.pos()?;
            if here != next_sibling {
                bail!(
                    "region entry in {} ended at {}, expected {}",
                    self.path,
                    here,
                    next_sibling
                );
            }
        }
        Ok(regions)
    }

    fn read_region_entry(&self, scanner: &mut FileScanner) -> Result<IndexRegion> {
        let index_offset = scanner.pos()?;
        let data_offset = scanner.read_u64()?;
        let parent_index_offset = scanner.read_u64()?;
        let name = scanner.read_string()?;

        let raw_type = scanner.read_u8()?;
        let typ = match RefType::from_u8(raw_type) {
            Some(typ) => typ,
            None => bail!("invalid reference type {} in {}", raw_type, self.path),
        };
        let reference = ObjectFileRef::new(typ, scanner.read_file_offset(self.width_for(typ))?);

        let alias_count = scanner.read_varint_u64()?;
        let mut aliases = Vec::with_capacity(alias_count as usize);
        for _ in 0..alias_count {
            let alias_name = scanner.read_string()?;
            let node_offset = scanner.read_file_offset(self.node_width)?;
            aliases.push(RegionAlias {
                name: alias_name,
                node_offset,
            });
        }

        let regions = self.read_children(scanner)?;

        Ok(IndexRegion {
            name,
            reference,
            aliases,
            index_offset,
            parent_index_offset,
            data_offset,
            regions,
        })
    }

    /// Loads the POIs and locations of one region.
    pub fn region_data(&self, region: &IndexRegion) -> Result<RegionData> {
        let mut scanner = self.open()?;
        scanner.seek(region.data_offset)?;

        let poi_count = scanner.read_varint_u64()?;
        let mut refs = ObjectFileRefStreamReader::new();
        let mut pois = Vec::with_capacity(poi_count as usize);
        for _ in 0..poi_count {
            let name = scanner.read_string()?;
            let object = refs.read(&mut scanner)?;
            pois.push(RegionPoi { name, object });
        }

        let location_count = scanner.read_varint_u64()?;
        let mut locations = Vec::with_capacity(location_count as usize);
        for _ in 0..location_count {
            let name = scanner.read_string()?;
            let object_count = scanner.read_varint_u64()?;
            let addresses_offset = if scanner.read_bool()? {
                Some(scanner.read_u64()?)
            } else {
                None
            };
            refs.reset();
            let mut objects = Vec::with_capacity(object_count as usize);
            for _ in 0..object_count {
                objects.push(refs.read(&mut scanner)?);
            }
            locations.push(RegionLocationEntry {
                name,
                objects,
                addresses_offset,
            });
        }

        Ok(RegionData { pois, locations })
    }

    /// Loads the address list a location points at.
    pub fn addresses(&self, offset: FileOffset) -> Result<Vec<RegionAddress>> {
        let mut scanner = self.open()?;
        scanner.seek(offset)?;

        let count = scanner.read_varint_u64()?;
        let mut refs = ObjectFileRefStreamReader::new();
        let mut addresses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let house_number = scanner.read_string()?;
            let object = refs.read(&mut scanner)?;
            addresses.push(RegionAddress {
                house_number,
                object,
            });
        }
        Ok(addresses)
    }
}
