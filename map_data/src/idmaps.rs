//! The id resolution files: OSM way ids to file offsets, OSM node ids to
//! network points, and the raw turn restrictions. All three are only touched
//! while building the routing graph.

use anyhow::{bail, Result};
use osmio::{FileOffset, FileScanner, FileWriter};

use crate::point::Point;
use crate::OsmId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnRestrictionKind {
    /// Only the listed turn is allowed; everything else from the same way is
    /// forbidden.
    Allow = 0,
    /// The listed turn is forbidden.
    Forbid = 1,
}

/// A raw turn restriction, still in OSM id space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnRestriction {
    pub kind: TurnRestrictionKind,
    pub from_way: OsmId,
    pub via_node: OsmId,
    pub to_way: OsmId,
}

pub fn write_turn_restrictions(writer: &mut FileWriter, restrictions: &[TurnRestriction]) -> Result<()> {
    writer.write_u32(restrictions.len() as u32)?;
    for r in restrictions {
        writer.write_u8(r.kind as u8)?;
        writer.write_varint_u64(r.from_way)?;
        writer.write_varint_u64(r.via_node)?;
        writer.write_varint_u64(r.to_way)?;
    }
    Ok(())
}

pub fn read_turn_restrictions(scanner: &mut FileScanner) -> Result<Vec<TurnRestriction>> {
    let count = scanner.read_u32()?;
    let mut restrictions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let kind = match scanner.read_u8()? {
            0 => TurnRestrictionKind::Allow,
            1 => TurnRestrictionKind::Forbid,
            x => bail!("invalid turn restriction kind {}", x),
        };
        let from_way = scanner.read_varint_u64()?;
        let via_node = scanner.read_varint_u64()?;
        let to_way = scanner.read_varint_u64()?;
        restrictions.push(TurnRestriction {
            kind,
            from_way,
            via_node,
            to_way,
        });
    }
    Ok(restrictions)
}

/// `wayids.map`: sorted (OSM way id, file offset) pairs.
pub fn write_way_id_map(writer: &mut FileWriter, entries: &[(OsmId, FileOffset)]) -> Result<()> {
    writer.write_u32(entries.len() as u32)?;
    for (id, offset) in entries {
        writer.write_varint_u64(*id)?;
        writer.write_u64(*offset)?;
    }
    Ok(())
}

/// Streams `wayids.map`, calling back for every entry.
pub fn read_way_id_map(
    scanner: &mut FileScanner,
    mut callback: impl FnMut(OsmId, FileOffset),
) -> Result<()> {
    let count = scanner.read_u32()?;
    for _ in 0..count {
        let id = scanner.read_varint_u64()?;
        let offset = scanner.read_u64()?;
        callback(id, offset);
    }
    Ok(())
}

/// `coords.dat`: OSM node id to the network [`Point`] it became.
pub fn write_coord_id_map(writer: &mut FileWriter, entries: &[(OsmId, Point)]) -> Result<()> {
    writer.write_u32(entries.len() as u32)?;
    for (id, point) in entries {
        writer.write_varint_u64(*id)?;
        writer.write_u8(point.serial)?;
        writer.write_coord(point.coord)?;
    }
    Ok(())
}

pub fn read_coord_id_map(
    scanner: &mut FileScanner,
    mut callback: impl FnMut(OsmId, Point),
) -> Result<()> {
    let count = scanner.read_u32()?;
    for _ in 0..count {
        let id = scanner.read_varint_u64()?;
        let serial = scanner.read_u8()?;
        let coord = scanner.read_coord()?;
        callback(id, Point::new(serial, coord));
    }
    Ok(())
}
