use std::collections::BTreeMap;

use geom::{ring_quorum_in_ring, GeoBox, GeoCoord};
use map_data::ObjectFileRef;
use osmio::FileOffset;

/// An alternative name for a region, contributed by a place node inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionAlias {
    pub name: String,
    pub node_offset: FileOffset,
}

/// One address of a location: house number plus the object carrying it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionAddress {
    pub house_number: String,
    pub object: ObjectFileRef,
}

/// A named location (street) inside a region: the ways/areas carrying the
/// name, plus its addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionLocation {
    pub objects: Vec<ObjectFileRef>,
    pub addresses: Vec<RegionAddress>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionPoi {
    pub name: String,
    pub object: ObjectFileRef,
}

/// A node of the region tree. Children are owned by value; traversals that
/// need the parent carry it alongside instead of storing back-pointers.
#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub reference: ObjectFileRef,
    /// Outer polygon rings. A multipolygon region has several.
    pub areas: Vec<Vec<GeoCoord>>,
    pub bounds: GeoBox,
    pub aliases: Vec<RegionAlias>,
    pub regions: Vec<Region>,
    pub locations: BTreeMap<String, RegionLocation>,
    pub pois: Vec<RegionPoi>,
    /// Both filled in during serialization.
    pub index_offset: FileOffset,
    pub data_offset: FileOffset,
}

impl Region {
    pub fn new(name: String, reference: ObjectFileRef, areas: Vec<Vec<GeoCoord>>) -> Region {
        assert!(!areas.is_empty());
        let mut bounds = GeoBox::from_ring(&areas[0]);
        for ring in &areas[1..] {
            bounds = bounds.union(GeoBox::from_ring(ring));
        }
        Region {
            name,
            reference,
            areas,
            bounds,
            aliases: Vec::new(),
            regions: Vec::new(),
            locations: BTreeMap::new(),
            pois: Vec::new(),
            index_offset: 0,
            data_offset: 0,
        }
    }

    /// The synthetic root covering the whole world.
    pub fn root() -> Region {
        Region {
            name: "<root>".to_string(),
            reference: ObjectFileRef::node(0),
            areas: Vec::new(),
            bounds: GeoBox::new(-90.0, -180.0, 90.0, 180.0),
            aliases: Vec::new(),
            regions: Vec::new(),
            locations: BTreeMap::new(),
            pois: Vec::new(),
            index_offset: 0,
            data_offset: 0,
        }
    }

    fn contains_candidate(&self, candidate: &Region) -> bool {
        for c_ring in &candidate.areas {
            for p_ring in &self.areas {
                if ring_quorum_in_ring(c_ring, p_ring) {
                    return true;
                }
            }
        }
        false
    }

    /// Insert `candidate` at the deepest position whose rings contain it.
    /// The first child (in insertion order) that contains the candidate
    /// wins, making the result a pure function of input order.
    ///
    /// A candidate with the same name as the containing child but a weaker
    /// primary reference is dropped entirely: that's the city that exists
    /// both as a boundary relation and as a place node.
    pub fn add(&mut self, candidate: Region) {
        for child in &mut self.regions {
            if !child.bounds.overlaps(&candidate.bounds) {
                continue;
            }
            if child.contains_candidate(&candidate) {
                if candidate.name == child.name
                    && candidate.reference.typ.strength() < child.reference.typ.strength()
                {
                    return;
                }
                child.add(candidate);
                return;
            }
        }
        self.regions.push(candidate);
    }

    /// 1 for a leaf (counting the region itself).
    pub fn depth(&self) -> usize {
        1 + self
            .regions
            .iter()
            .map(Region::depth)
            .max()
            .unwrap_or(0)
    }

    pub fn region_count(&self) -> usize {
        1 + self.regions.iter().map(Region::region_count).sum::<usize>()
    }
}
