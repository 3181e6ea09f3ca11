//! The data model shared by the index builders and the router: object
//! references, stable point ids, the type configuration, access flags, and
//! the intermediate `.dat` file records the import preprocessor hands us.

mod access;
mod idmaps;
mod params;
mod point;
mod records;
mod refs;
mod types;

pub use crate::access::{AccessValue, RestrictedValue, Vehicle, VehicleMask};
pub use crate::idmaps::{
    read_coord_id_map, read_turn_restrictions, read_way_id_map, write_coord_id_map,
    write_turn_restrictions, write_way_id_map, TurnRestriction, TurnRestrictionKind,
};
pub use crate::params::ImportParameter;
pub use crate::point::{coord_from_id, NodeId, Point};
pub use crate::records::{Area, AreaRing, Node, RingRole, Way};
pub use crate::refs::{ObjectFileRef, ObjectFileRefStreamReader, ObjectFileRefStreamWriter, RefType};
pub use crate::types::{TypeConfig, TypeId, TypeInfo};

/// An OSM object id, as assigned upstream.
pub type OsmId = u64;

pub const NODES_DAT: &str = "nodes.dat";
pub const WAYS_DAT: &str = "ways.dat";
pub const AREAS_DAT: &str = "areas.dat";
pub const COORDS_DAT: &str = "coords.dat";
pub const WAY_ID_MAP: &str = "wayids.map";
pub const TURN_RESTRICTIONS_DAT: &str = "turnrestr.dat";
pub const INTERSECTIONS_DAT: &str = "intersections.dat";
pub const LOCATION_IDX: &str = "location.idx";

pub fn route_nodes_filename(vehicle: Vehicle) -> String {
    format!("router_{}.dat", vehicle)
}

pub fn object_variants_filename(vehicle: Vehicle) -> String {
    format!("router_{}.variants.dat", vehicle)
}
