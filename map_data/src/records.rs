//! The record formats of the intermediate data files. Each file starts with
//! a `u32` record count; every record is self-delimiting, and its position
//! in the file is its identity (the `ObjectFileRef` offset).

use anyhow::{bail, Result};
use geom::{GeoBox, GeoCoord};
use osmio::{FileScanner, FileWriter};

use crate::access::{AccessValue, RestrictedValue};
use crate::point::{NodeId, Point};
use crate::types::TypeId;

const FLAG_NAME: u8 = 1 << 0;
const FLAG_ADDRESS: u8 = 1 << 1;
const FLAG_ACCESS: u8 = 1 << 2;
const FLAG_RESTRICTED: u8 = 1 << 3;

fn write_points(writer: &mut FileWriter, points: &[Point]) -> Result<()> {
    writer.write_varint_u64(points.len() as u64)?;
    for p in points {
        writer.write_u8(p.serial)?;
        writer.write_coord(p.coord)?;
    }
    Ok(())
}

fn read_points(scanner: &mut FileScanner) -> Result<Vec<Point>> {
    let count = scanner.read_varint_u64()? as usize;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let serial = scanner.read_u8()?;
        let coord = scanner.read_coord()?;
        points.push(Point::new(serial, coord));
    }
    Ok(points)
}

/// A node from `nodes.dat`: a POI, a place node, or an address point.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub type_id: TypeId,
    pub coord: GeoCoord,
    pub name: Option<String>,
    /// Street name + house number, when the node carries address tags.
    pub address: Option<(String, String)>,
}

impl Node {
    pub fn write(&self, writer: &mut FileWriter) -> Result<()> {
        writer.write_varint_u64(u64::from(self.type_id))?;
        let mut flags = 0;
        if self.name.is_some() {
            flags |= FLAG_NAME;
        }
        if self.address.is_some() {
            flags |= FLAG_ADDRESS;
        }
        writer.write_u8(flags)?;
        if let Some(ref name) = self.name {
            writer.write_string(name)?;
        }
        if let Some((ref street, ref number)) = self.address {
            writer.write_string(street)?;
            writer.write_string(number)?;
        }
        writer.write_coord(self.coord)?;
        Ok(())
    }

    pub fn read(scanner: &mut FileScanner) -> Result<Node> {
        let type_id = scanner.read_varint_u64()? as TypeId;
        let flags = scanner.read_u8()?;
        let name = if flags & FLAG_NAME != 0 {
            Some(scanner.read_string()?)
        } else {
            None
        };
        let address = if flags & FLAG_ADDRESS != 0 {
            let street = scanner.read_string()?;
            let number = scanner.read_string()?;
            Some((street, number))
        } else {
            None
        };
        let coord = scanner.read_coord()?;
        Ok(Node {
            type_id,
            coord,
            name,
            address,
        })
    }
}

/// A way from `ways.dat`: a street, path, or any other polyline object.
#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub type_id: TypeId,
    pub name: Option<String>,
    /// Street name + house number from address tags, for address indexing.
    pub address: Option<(String, String)>,
    /// Explicit access; `None` falls back to the type default.
    pub access: Option<AccessValue>,
    pub restricted: Option<RestrictedValue>,
    /// km/h, 0 for unknown.
    pub max_speed: u8,
    /// Surface grade 1 (best) to 5.
    pub grade: u8,
    pub nodes: Vec<Point>,
}

impl Way {
    pub fn is_circular(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first().unwrap().id() == self.nodes.last().unwrap().id()
    }

    pub fn node_index_by_id(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|p| p.id() == id)
    }

    pub fn bounds(&self) -> GeoBox {
        GeoBox::from_ring(
            &self
                .nodes
                .iter()
                .map(|p| p.coord)
                .collect::<Vec<GeoCoord>>(),
        )
    }

    pub fn write(&self, writer: &mut FileWriter) -> Result<()> {
        writer.write_varint_u64(u64::from(self.type_id))?;
        let mut flags = 0;
        if self.name.is_some() {
            flags |= FLAG_NAME;
        }
        if self.address.is_some() {
            flags |= FLAG_ADDRESS;
        }
        if self.access.is_some() {
            flags |= FLAG_ACCESS;
        }
        if self.restricted.is_some() {
            flags |= FLAG_RESTRICTED;
        }
        writer.write_u8(flags)?;
        if let Some(ref name) = self.name {
            writer.write_string(name)?;
        }
        if let Some((ref street, ref number)) = self.address {
            writer.write_string(street)?;
            writer.write_string(number)?;
        }
        if let Some(ref access) = self.access {
            writer.write_u8(access.to_byte())?;
        }
        if let Some(ref restricted) = self.restricted {
            writer.write_u8(restricted.to_byte())?;
        }
        writer.write_u8(self.max_speed)?;
        writer.write_u8(self.grade)?;
        write_points(writer, &self.nodes)?;
        Ok(())
    }

    pub fn read(scanner: &mut FileScanner) -> Result<Way> {
        let type_id = scanner.read_varint_u64()? as TypeId;
        let flags = scanner.read_u8()?;
        let name = if flags & FLAG_NAME != 0 {
            Some(scanner.read_string()?)
        } else {
            None
        };
        let address = if flags & FLAG_ADDRESS != 0 {
            let street = scanner.read_string()?;
            let number = scanner.read_string()?;
            Some((street, number))
        } else {
            None
        };
        let access = if flags & FLAG_ACCESS != 0 {
            Some(AccessValue::from_byte(scanner.read_u8()?))
        } else {
            None
        };
        let restricted = if flags & FLAG_RESTRICTED != 0 {
            Some(RestrictedValue::from_byte(scanner.read_u8()?))
        } else {
            None
        };
        let max_speed = scanner.read_u8()?;
        let grade = scanner.read_u8()?;
        let nodes = read_points(scanner)?;
        Ok(Way {
            type_id,
            name,
            address,
            access,
            restricted,
            max_speed,
            grade,
            nodes,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingRole {
    Outer = 0,
    Inner = 1,
}

/// One ring of an area. Outer rings define containment; inner rings (holes)
/// only matter to rendering and are ignored by the location index.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaRing {
    pub role: RingRole,
    pub type_id: TypeId,
    pub name: Option<String>,
    pub address: Option<(String, String)>,
    /// Only on administrative boundaries, 1 (country) to 10.
    pub admin_level: Option<u8>,
    pub nodes: Vec<Point>,
}

impl AreaRing {
    pub fn coords(&self) -> Vec<GeoCoord> {
        self.nodes.iter().map(|p| p.coord).collect()
    }

    pub fn bounds(&self) -> GeoBox {
        GeoBox::from_ring(&self.coords())
    }

    pub fn node_index_by_id(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|p| p.id() == id)
    }
}

/// An area from `areas.dat`: a closed object, possibly a multipolygon with
/// several outer rings.
#[derive(Clone, Debug, PartialEq)]
pub struct Area {
    pub type_id: TypeId,
    pub rings: Vec<AreaRing>,
}

impl Area {
    /// Simple areas have exactly one outer ring and no holes. Routing only
    /// considers simple areas.
    pub fn is_simple(&self) -> bool {
        self.rings.len() == 1 && self.rings[0].role == RingRole::Outer
    }

    pub fn outer_rings(&self) -> impl Iterator<Item = &AreaRing> {
        self.rings.iter().filter(|r| r.role == RingRole::Outer)
    }

    pub fn bounds(&self) -> GeoBox {
        let mut bounds: Option<GeoBox> = None;
        for ring in self.outer_rings() {
            let b = ring.bounds();
            bounds = Some(match bounds {
                Some(prev) => prev.union(b),
                None => b,
            });
        }
        bounds.expect("area without outer rings")
    }

    pub fn write(&self, writer: &mut FileWriter) -> Result<()> {
        writer.write_varint_u64(u64::from(self.type_id))?;
        writer.write_varint_u64(self.rings.len() as u64)?;
        for ring in &self.rings {
            writer.write_u8(ring.role as u8)?;
            writer.write_varint_u64(u64::from(ring.type_id))?;
            let mut flags = 0;
            if ring.name.is_some() {
                flags |= FLAG_NAME;
            }
            if ring.address.is_some() {
                flags |= FLAG_ADDRESS;
            }
            writer.write_u8(flags)?;
            if let Some(ref name) = ring.name {
                writer.write_string(name)?;
            }
            if let Some((ref street, ref number)) = ring.address {
                writer.write_string(street)?;
                writer.write_string(number)?;
            }
            writer.write_u8(ring.admin_level.unwrap_or(0))?;
            write_points(writer, &ring.nodes)?;
        }
        Ok(())
    }

    pub fn read(scanner: &mut FileScanner) -> Result<Area> {
        let type_id = scanner.read_varint_u64()? as TypeId;
        let ring_count = scanner.read_varint_u64()? as usize;
        let mut rings = Vec::with_capacity(ring_count);
        for _ in 0..ring_count {
            let role = match scanner.read_u8()? {
                0 => RingRole::Outer,
                1 => RingRole::Inner,
                x => bail!("invalid ring role {}", x),
            };
            let ring_type = scanner.read_varint_u64()? as TypeId;
            let flags = scanner.read_u8()?;
            let name = if flags & FLAG_NAME != 0 {
                Some(scanner.read_string()?)
            } else {
                None
            };
            let address = if flags & FLAG_ADDRESS != 0 {
                let street = scanner.read_string()?;
                let number = scanner.read_string()?;
                Some((street, number))
            } else {
                None
            };
            let admin_level = match scanner.read_u8()? {
                0 => None,
                level => Some(level),
            };
            let nodes = read_points(scanner)?;
            rings.push(AreaRing {
                role,
                type_id: ring_type,
                name,
                address,
                admin_level,
                nodes,
            });
        }
        Ok(Area { type_id, rings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmio::ScannerMode;

    fn pt(serial: u8, lat: f64, lon: f64) -> Point {
        Point::new(serial, GeoCoord::new(lat, lon))
    }

    #[test]
    fn record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.dat").display().to_string();

        let node = Node {
            type_id: 3,
            coord: GeoCoord::new(48.0, 11.0),
            name: Some("Kiosk".to_string()),
            address: Some(("Main".to_string(), "12".to_string())),
        };
        let way = Way {
            type_id: 1,
            name: Some("Main".to_string()),
            address: None,
            access: Some(AccessValue::bidirectional(true, true, true)),
            restricted: None,
            max_speed: 50,
            grade: 1,
            nodes: vec![pt(1, 48.0, 11.0), pt(0, 48.001, 11.0), pt(2, 48.002, 11.0)],
        };
        let area = Area {
            type_id: 2,
            rings: vec![AreaRing {
                role: RingRole::Outer,
                type_id: 2,
                name: Some("Park".to_string()),
                address: None,
                admin_level: Some(6),
                nodes: vec![
                    pt(1, 0.0, 0.0),
                    pt(2, 0.0, 1.0),
                    pt(3, 1.0, 1.0),
                    pt(4, 1.0, 0.0),
                ],
            }],
        };

        let mut writer = FileWriter::create(&path).unwrap();
        node.write(&mut writer).unwrap();
        way.write(&mut writer).unwrap();
        area.write(&mut writer).unwrap();
        writer.close().unwrap();

        let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false).unwrap();
        let node2 = Node::read(&mut scanner).unwrap();
        let way2 = Way::read(&mut scanner).unwrap();
        let area2 = Area::read(&mut scanner).unwrap();
        assert_eq!(node.type_id, node2.type_id);
        assert_eq!(node.name, node2.name);
        assert_eq!(node.address, node2.address);
        assert_eq!(way.name, way2.name);
        assert_eq!(way.access, way2.access);
        assert_eq!(way.nodes.len(), way2.nodes.len());
        assert_eq!(way.nodes[0].id(), way2.nodes[0].id());
        assert_eq!(area.rings[0].admin_level, area2.rings[0].admin_level);
        assert!(area2.is_simple());
    }

    #[test]
    fn circular_way() {
        let mut way = Way {
            type_id: 1,
            name: None,
            address: None,
            access: None,
            restricted: None,
            max_speed: 0,
            grade: 1,
            nodes: vec![
                pt(1, 0.0, 0.0),
                pt(2, 0.0, 1.0),
                pt(3, 1.0, 1.0),
                pt(1, 0.0, 0.0),
            ],
        };
        assert!(way.is_circular());
        way.nodes.pop();
        assert!(!way.is_circular());
    }
}
