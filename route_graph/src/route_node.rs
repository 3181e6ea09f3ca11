use anyhow::{bail, Result};
use geom::GeoCoord;
use map_data::{NodeId, ObjectFileRef, RefType, TypeId, Vehicle};
use osmio::{FileScanner, FileWriter};

/// Per-path access bits. `usable` says the vehicle may traverse the edge at
/// all; `restricted` says the underlying way is destination-only for it. The
/// two are independent so the router can still *enter* a restricted zone.
pub mod flags {
    pub const USABLE_BY_FOOT: u8 = 1 << 0;
    pub const USABLE_BY_BICYCLE: u8 = 1 << 1;
    pub const USABLE_BY_CAR: u8 = 1 << 2;
    pub const RESTRICTED_FOR_FOOT: u8 = 1 << 3;
    pub const RESTRICTED_FOR_BICYCLE: u8 = 1 << 4;
    pub const RESTRICTED_FOR_CAR: u8 = 1 << 5;

    pub fn usable_bit(vehicle: super::Vehicle) -> u8 {
        match vehicle {
            super::Vehicle::Foot => USABLE_BY_FOOT,
            super::Vehicle::Bicycle => USABLE_BY_BICYCLE,
            super::Vehicle::Car => USABLE_BY_CAR,
        }
    }

    pub fn restricted_bit(vehicle: super::Vehicle) -> u8 {
        match vehicle {
            super::Vehicle::Foot => RESTRICTED_FOR_FOOT,
            super::Vehicle::Bicycle => RESTRICTED_FOR_BICYCLE,
            super::Vehicle::Car => RESTRICTED_FOR_CAR,
        }
    }
}

/// The `(type, max speed, grade)` tuple of an edge, interned once per
/// distinct value and referenced by a 16-bit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectVariant {
    pub type_id: TypeId,
    pub max_speed: u8,
    pub grade: u8,
}

/// A way or area incident at the junction, with its variant index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteObject {
    pub object: ObjectFileRef,
    pub variant_index: u16,
}

/// One outgoing edge.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePath {
    /// Id of the target route node; resolved through the tile table when
    /// traversed.
    pub target_id: NodeId,
    /// Index into the node's `objects`.
    pub object_index: usize,
    pub flags: u8,
    pub distance_m: f64,
}

impl RoutePath {
    pub fn is_usable_by(&self, vehicle: Vehicle) -> bool {
        self.flags & flags::usable_bit(vehicle) != 0
    }

    pub fn is_restricted_for(&self, vehicle: Vehicle) -> bool {
        self.flags & flags::restricted_bit(vehicle) != 0
    }
}

/// A turn ban: arriving over `source`, the path at `target_index` may not be
/// taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteExclude {
    pub source: ObjectFileRef,
    pub target_index: usize,
}

/// A junction of the routing graph.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteNode {
    pub id: NodeId,
    pub coord: GeoCoord,
    pub objects: Vec<RouteObject>,
    pub paths: Vec<RoutePath>,
    pub excludes: Vec<RouteExclude>,
}

impl RouteNode {
    pub fn new(id: NodeId, coord: GeoCoord) -> RouteNode {
        RouteNode {
            id,
            coord,
            objects: Vec::new(),
            paths: Vec::new(),
            excludes: Vec::new(),
        }
    }

    /// Registers the object (once) and returns its index.
    pub fn add_object(&mut self, object: ObjectFileRef, variant_index: u16) -> usize {
        if let Some(idx) = self.objects.iter().position(|o| o.object == object) {
            return idx;
        }
        self.objects.push(RouteObject {
            object,
            variant_index,
        });
        self.objects.len() - 1
    }

    pub fn object_of_path(&self, path_index: usize) -> ObjectFileRef {
        self.objects[self.paths[path_index].object_index].object
    }

    pub fn write(&self, writer: &mut FileWriter) -> Result<()> {
        writer.write_varint_u64(self.id)?;
        writer.write_coord(self.coord)?;

        writer.write_varint_u64(self.objects.len() as u64)?;
        for obj in &self.objects {
            writer.write_u8(obj.object.typ as u8)?;
            writer.write_varint_u64(obj.object.offset)?;
            writer.write_varint_u64(u64::from(obj.variant_index))?;
        }

        writer.write_varint_u64(self.paths.len() as u64)?;
        for path in &self.paths {
            writer.write_varint_u64(path.target_id)?;
            writer.write_varint_u64(path.object_index as u64)?;
            writer.write_u8(path.flags)?;
            writer.write_u64(path.distance_m.to_bits())?;
        }

        writer.write_varint_u64(self.excludes.len() as u64)?;
        for exclude in &self.excludes {
            writer.write_u8(exclude.source.typ as u8)?;
            writer.write_varint_u64(exclude.source.offset)?;
            writer.write_varint_u64(exclude.target_index as u64)?;
        }

        Ok(())
    }

    pub fn read(scanner: &mut FileScanner) -> Result<RouteNode> {
        let id = scanner.read_varint_u64()?;
        let coord = scanner.read_coord()?;

        let object_count = scanner.read_varint_u64()? as usize;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let typ = read_ref_type(scanner)?;
            let offset = scanner.read_varint_u64()?;
            let variant_index = scanner.read_varint_u64()? as u16;
            objects.push(RouteObject {
                object: ObjectFileRef::new(typ, offset),
                variant_index,
            });
        }

        let path_count = scanner.read_varint_u64()? as usize;
        let mut paths = Vec::with_capacity(path_count);
        for _ in 0..path_count {
            let target_id = scanner.read_varint_u64()?;
            let object_index = scanner.read_varint_u64()? as usize;
            let flags = scanner.read_u8()?;
            let distance_m = f64::from_bits(scanner.read_u64()?);
            paths.push(RoutePath {
                target_id,
                object_index,
                flags,
                distance_m,
            });
        }

        let exclude_count = scanner.read_varint_u64()? as usize;
        let mut excludes = Vec::with_capacity(exclude_count);
        for _ in 0..exclude_count {
            let typ = read_ref_type(scanner)?;
            let offset = scanner.read_varint_u64()?;
            let target_index = scanner.read_varint_u64()? as usize;
            excludes.push(RouteExclude {
                source: ObjectFileRef::new(typ, offset),
                target_index,
            });
        }

        Ok(RouteNode {
            id,
            coord,
            objects,
            paths,
            excludes,
        })
    }
}

/// The sidecar file mapping variant indices back to `(type, max speed,
/// grade)`.
pub fn write_object_variants(
    parameter: &map_data::ImportParameter,
    vehicle: Vehicle,
    variants: &[ObjectVariant],
) -> Result<()> {
    let path = parameter.file(&map_data::object_variants_filename(vehicle));
    let mut writer = FileWriter::create(&path)?;
    writer.write_u32(variants.len() as u32)?;
    for variant in variants {
        writer.write_varint_u64(u64::from(variant.type_id))?;
        writer.write_u8(variant.max_speed)?;
        writer.write_u8(variant.grade)?;
    }
    writer.close()?;
    Ok(())
}

pub fn read_object_variants(path: &str) -> Result<Vec<ObjectVariant>> {
    let mut scanner = FileScanner::open(path, osmio::ScannerMode::Sequential, false)?;
    let count = scanner.read_u32()?;
    let mut variants = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let type_id = scanner.read_varint_u64()? as TypeId;
        let max_speed = scanner.read_u8()?;
        let grade = scanner.read_u8()?;
        variants.push(ObjectVariant {
            type_id,
            max_speed,
            grade,
        });
    }
    scanner.close()?;
    Ok(variants)
}

fn read_ref_type(scanner: &mut FileScanner) -> Result<RefType> {
    let raw = scanner.read_u8()?;
    match RefType::from_u8(raw) {
        Some(typ) => Ok(typ),
        None => bail!("invalid object type {}", raw),
    }
}
