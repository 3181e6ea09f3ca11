//! Geographic primitives shared by the index builders and the router: plain
//! WGS84 coordinates, axis-aligned bounding boxes, and the handful of
//! polygon-ring predicates every containment decision is built from.

mod coord;
mod ring;

pub use crate::coord::{GeoBox, GeoCoord, EARTH_RADIUS_METERS};
pub use crate::ring::{
    coord_in_ring, ring_completely_in_ring, ring_partly_in_ring, ring_quorum_in_ring,
    segments_cross,
};
