//! Containment predicates over closed polygon rings. A ring is a sequence of
//! vertices; the closing edge from the last vertex back to the first is
//! implied. Boundary points count as inside, which keeps objects snapped
//! exactly onto an administrative border from dropping out of the index.

use crate::GeoCoord;

/// Fraction of vertices that must fall inside for the quorum test. OSM
/// boundaries are hand-drawn and routinely spill over each other a little.
const QUORUM: f64 = 0.8;

const EPSILON: f64 = 1e-12;

fn on_segment(p: GeoCoord, a: GeoCoord, b: GeoCoord) -> bool {
    let cross = (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon);
    if cross.abs() > EPSILON {
        return false;
    }
    p.lon >= a.lon.min(b.lon) - EPSILON
        && p.lon <= a.lon.max(b.lon) + EPSILON
        && p.lat >= a.lat.min(b.lat) - EPSILON
        && p.lat <= a.lat.max(b.lat) + EPSILON
}

/// Ray casting with ordered-edge counting. Points on an edge or vertex are
/// inside.
pub fn coord_in_ring(coord: GeoCoord, ring: &[GeoCoord]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];

        if on_segment(coord, a, b) {
            return true;
        }

        if (a.lat > coord.lat) != (b.lat > coord.lat) {
            let x = (b.lon - a.lon) * (coord.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if coord.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn orientation(a: GeoCoord, b: GeoCoord, c: GeoCoord) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

/// True if the open segments properly cross. Shared endpoints and mere
/// touching don't count; a vertex of one ring lying exactly on the other
/// ring's edge is handled by the boundary-is-inside rule instead.
pub fn segments_cross(a1: GeoCoord, a2: GeoCoord, b1: GeoCoord, b2: GeoCoord) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

fn any_edges_cross(inner: &[GeoCoord], outer: &[GeoCoord]) -> bool {
    let mut i_prev = inner.len() - 1;
    for i in 0..inner.len() {
        let mut o_prev = outer.len() - 1;
        for o in 0..outer.len() {
            if segments_cross(inner[i_prev], inner[i], outer[o_prev], outer[o]) {
                return true;
            }
            o_prev = o;
        }
        i_prev = i;
    }
    false
}

/// Every vertex of `inner` lies in `outer` and no edges cross. The edge test
/// matters: a vertex-only test misses rings that poke out between two outer
/// vertices.
pub fn ring_completely_in_ring(inner: &[GeoCoord], outer: &[GeoCoord]) -> bool {
    if inner.is_empty() {
        return false;
    }
    if inner.iter().any(|c| !coord_in_ring(*c, outer)) {
        return false;
    }
    !any_edges_cross(inner, outer)
}

/// At least one vertex of `inner` lies in `outer`, or some edges cross.
pub fn ring_partly_in_ring(inner: &[GeoCoord], outer: &[GeoCoord]) -> bool {
    if inner.is_empty() {
        return false;
    }
    if inner.iter().any(|c| coord_in_ring(*c, outer)) {
        return true;
    }
    any_edges_cross(inner, outer)
}

/// At least 80% of `inner`'s vertices lie in `outer`. Used for
/// region-in-region sorting, where exact containment is too strict for real
/// OSM data.
pub fn ring_quorum_in_ring(inner: &[GeoCoord], outer: &[GeoCoord]) -> bool {
    if inner.is_empty() {
        return false;
    }
    let hits = inner.iter().filter(|c| coord_in_ring(**c, outer)).count();
    (hits as f64) >= QUORUM * (inner.len() as f64)
}
