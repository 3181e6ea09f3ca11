//! Derives the outgoing paths of one route node from the ways and areas
//! meeting there: walk each object to the neighboring junctions, accumulate
//! great-circle distances, and stamp per-vehicle access flags.

use map_data::{AccessValue, NodeId, ObjectFileRef, RestrictedValue, TypeConfig, Way};
use map_data::{Area, Point};
use std::collections::BTreeSet;

use crate::restrictions::{can_turn, ViaTurnRestrictions};
use crate::route_node::{flags, RouteExclude, RouteNode, RoutePath};

pub(crate) fn restricted_flags(restricted: Option<RestrictedValue>) -> u8 {
    let mut result = 0;
    if let Some(r) = restricted {
        if r.foot {
            result |= flags::RESTRICTED_FOR_FOOT;
        }
        if r.bicycle {
            result |= flags::RESTRICTED_FOR_BICYCLE;
        }
        if r.car {
            result |= flags::RESTRICTED_FOR_CAR;
        }
    }
    result
}

pub(crate) fn copy_flags_forward(access: AccessValue, restricted: Option<RestrictedValue>) -> u8 {
    let mut result = restricted_flags(restricted);
    if access.foot_forward {
        result |= flags::USABLE_BY_FOOT;
    }
    if access.bicycle_forward {
        result |= flags::USABLE_BY_BICYCLE;
    }
    if access.car_forward {
        result |= flags::USABLE_BY_CAR;
    }
    result
}

pub(crate) fn copy_flags_backward(access: AccessValue, restricted: Option<RestrictedValue>) -> u8 {
    let mut result = restricted_flags(restricted);
    if access.foot_backward {
        result |= flags::USABLE_BY_FOOT;
    }
    if access.bicycle_backward {
        result |= flags::USABLE_BY_BICYCLE;
    }
    if access.car_backward {
        result |= flags::USABLE_BY_CAR;
    }
    result
}

/// Area edges are never one-way and never restricted; usability comes from
/// the area type's default access.
pub(crate) fn area_flags(config: &TypeConfig, area: &Area) -> u8 {
    let access = config.get(area.type_id).default_access;
    let mut result = 0;
    if access.foot_forward || access.foot_backward {
        result |= flags::USABLE_BY_FOOT;
    }
    if access.bicycle_forward || access.bicycle_backward {
        result |= flags::USABLE_BY_BICYCLE;
    }
    if access.car_forward || access.car_backward {
        result |= flags::USABLE_BY_CAR;
    }
    result
}

fn segment_distance(points: &[Point], from: usize, to: usize) -> f64 {
    let mut distance = 0.0;
    for d in from..to {
        distance += points[d].coord.distance_to(points[d + 1].coord);
    }
    distance
}

/// A plain (non-circular) way: one forward and one backward path, each to
/// the nearest junction along the way, directions gated by the way's access.
pub(crate) fn calculate_way_paths(
    route_node: &mut RouteNode,
    way: &Way,
    way_ref: ObjectFileRef,
    variant_index: u16,
    access: AccessValue,
    junction_ids: &BTreeSet<NodeId>,
) {
    let current = match way.node_index_by_id(route_node.id) {
        Some(idx) => idx,
        None => return,
    };

    if access.any_backward() && current > 0 {
        if let Some(j) = (0..current)
            .rev()
            .find(|j| junction_ids.contains(&way.nodes[*j].id()))
        {
            if way.nodes[j].id() != route_node.id {
                let object_index = route_node.add_object(way_ref, variant_index);
                route_node.paths.push(RoutePath {
                    target_id: way.nodes[j].id(),
                    object_index,
                    flags: copy_flags_backward(access, way.restricted),
                    distance_m: segment_distance(&way.nodes, j, current),
                });
            }
        }
    }

    if access.any_forward() && current + 1 < way.nodes.len() {
        if let Some(j) =
            (current + 1..way.nodes.len()).find(|j| junction_ids.contains(&way.nodes[*j].id()))
        {
            if way.nodes[j].id() != route_node.id {
                let object_index = route_node.add_object(way_ref, variant_index);
                route_node.paths.push(RoutePath {
                    target_id: way.nodes[j].id(),
                    object_index,
                    flags: copy_flags_forward(access, way.restricted),
                    distance_m: segment_distance(&way.nodes, current, j),
                });
            }
        }
    }
}

/// Walks a closed ring from `current` in the given direction to the next
/// junction, returning (index, accumulated distance), or None after a full
/// lap.
fn walk_ring(
    points: &[Point],
    current: usize,
    forward: bool,
    junction_ids: &BTreeSet<NodeId>,
) -> Option<(usize, f64)> {
    let len = points.len();
    let step = |idx: usize| {
        if forward {
            if idx + 1 >= len {
                0
            } else {
                idx + 1
            }
        } else if idx == 0 {
            len - 1
        } else {
            idx - 1
        }
    };

    let mut next = step(current);
    let mut distance = points[current].coord.distance_to(points[next].coord);

    while next != current && !junction_ids.contains(&points[next].id()) {
        let last = next;
        next = step(next);
        if next != current {
            distance += points[last].coord.distance_to(points[next].coord);
        }
    }

    if next == current {
        None
    } else {
        Some((next, distance))
    }
}

/// A circular way: ring traversal in both directions, each gated by the
/// way's one-way access.
pub(crate) fn calculate_circular_way_paths(
    route_node: &mut RouteNode,
    way: &Way,
    way_ref: ObjectFileRef,
    variant_index: u16,
    access: AccessValue,
    junction_ids: &BTreeSet<NodeId>,
) {
    let current = match way.node_index_by_id(route_node.id) {
        Some(idx) => idx,
        None => return,
    };

    let mut forward_target = None;
    if access.any_forward() {
        if let Some((next, distance)) = walk_ring(&way.nodes, current, true, junction_ids) {
            if way.nodes[next].id() != route_node.id {
                forward_target = Some(next);
                let object_index = route_node.add_object(way_ref, variant_index);
                route_node.paths.push(RoutePath {
                    target_id: way.nodes[next].id(),
                    object_index,
                    flags: copy_flags_forward(access, way.restricted),
                    distance_m: distance,
                });
            }
        }
    }

    if access.any_backward() {
        if let Some((prev, distance)) = walk_ring(&way.nodes, current, false, junction_ids) {
            if Some(prev) != forward_target && way.nodes[prev].id() != route_node.id {
                let object_index = route_node.add_object(way_ref, variant_index);
                route_node.paths.push(RoutePath {
                    target_id: way.nodes[prev].id(),
                    object_index,
                    flags: copy_flags_backward(access, way.restricted),
                    distance_m: distance,
                });
            }
        }
    }
}

/// An area: the outer ring is traversed clockwise and counter-clockwise.
pub(crate) fn calculate_area_paths(
    route_node: &mut RouteNode,
    config: &TypeConfig,
    area: &Area,
    area_ref: ObjectFileRef,
    variant_index: u16,
    junction_ids: &BTreeSet<NodeId>,
) {
    let ring = &area.rings[0];
    let current = match ring.node_index_by_id(route_node.id) {
        Some(idx) => idx,
        None => return,
    };
    let path_flags = area_flags(config, area);

    let mut forward_target = None;
    if let Some((next, distance)) = walk_ring(&ring.nodes, current, true, junction_ids) {
        if ring.nodes[next].id() != route_node.id {
            forward_target = Some(next);
            let object_index = route_node.add_object(area_ref, variant_index);
            route_node.paths.push(RoutePath {
                target_id: ring.nodes[next].id(),
                object_index,
                flags: path_flags,
                distance_m: distance,
            });
        }
    }

    if let Some((prev, distance)) = walk_ring(&ring.nodes, current, false, junction_ids) {
        if Some(prev) != forward_target && ring.nodes[prev].id() != route_node.id {
            let object_index = route_node.add_object(area_ref, variant_index);
            route_node.paths.push(RoutePath {
                target_id: ring.nodes[prev].id(),
                object_index,
                flags: path_flags,
                distance_m: distance,
            });
        }
    }
}

/// Materializes the turn restrictions acting at this junction into excludes.
/// Only way-to-way turns are supported; the stored index points at the first
/// path onto the forbidden way, and the router compares by object so every
/// parallel path onto it is banned too.
pub(crate) fn fill_route_path_excludes(
    route_node: &mut RouteNode,
    incident_objects: &[ObjectFileRef],
    restrictions: &ViaTurnRestrictions,
) {
    let constraints = match restrictions.get(&route_node.id) {
        Some(constraints) => constraints,
        None => return,
    };

    for source in incident_objects {
        if source.typ != map_data::RefType::Way {
            continue;
        }
        for dest in incident_objects {
            if dest.typ != map_data::RefType::Way || source == dest {
                continue;
            }
            if can_turn(constraints, source.offset, dest.offset) {
                continue;
            }
            let target_index = route_node
                .paths
                .iter()
                .position(|path| route_node.objects[path.object_index].object == *dest);
            if let Some(target_index) = target_index {
                route_node.excludes.push(RouteExclude {
                    source: *source,
                    target_index,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::GeoCoord;
    use map_data::Vehicle;

    fn pt(serial: u8, lat: f64, lon: f64) -> Point {
        Point::new(serial, GeoCoord::new(lat, lon))
    }

    fn plain_way(nodes: Vec<Point>) -> Way {
        Way {
            type_id: 0,
            name: None,
            address: None,
            access: Some(AccessValue::bidirectional(true, true, true)),
            restricted: None,
            max_speed: 50,
            grade: 1,
            nodes,
        }
    }

    #[test]
    fn way_paths_reach_nearest_junctions() {
        // Five nodes; junctions at 0, 2, 4. From node 2, paths must reach 0
        // and 4, skipping the intermediate non-junction nodes.
        let way = plain_way(vec![
            pt(1, 0.0, 0.0),
            pt(2, 0.0, 0.01),
            pt(3, 0.0, 0.02),
            pt(4, 0.0, 0.03),
            pt(5, 0.0, 0.04),
        ]);
        let junction_ids: BTreeSet<NodeId> =
            [way.nodes[0].id(), way.nodes[2].id(), way.nodes[4].id()]
                .into_iter()
                .collect();

        let mut node = RouteNode::new(way.nodes[2].id(), way.nodes[2].coord);
        calculate_way_paths(
            &mut node,
            &way,
            ObjectFileRef::way(10),
            0,
            way.access.unwrap(),
            &junction_ids,
        );

        assert_eq!(node.paths.len(), 2);
        assert_eq!(node.paths[0].target_id, way.nodes[0].id());
        assert_eq!(node.paths[1].target_id, way.nodes[4].id());
        // Distance sums the skipped segments.
        let expected = way.nodes[0].coord.distance_to(way.nodes[1].coord)
            + way.nodes[1].coord.distance_to(way.nodes[2].coord);
        assert!((node.paths[0].distance_m - expected).abs() < 1e-6);
        // One shared object entry for both paths.
        assert_eq!(node.objects.len(), 1);
    }

    #[test]
    fn oneway_produces_single_path() {
        let way = Way {
            access: Some(
                AccessValue::bidirectional(false, false, true).oneway_for(Vehicle::Car),
            ),
            ..plain_way(vec![pt(1, 0.0, 0.0), pt(2, 0.0, 0.01), pt(3, 0.0, 0.02)])
        };
        let junction_ids: BTreeSet<NodeId> = [way.nodes[0].id(), way.nodes[2].id()]
            .into_iter()
            .collect();

        // From the first node, only forward works.
        let mut node = RouteNode::new(way.nodes[0].id(), way.nodes[0].coord);
        calculate_way_paths(
            &mut node,
            &way,
            ObjectFileRef::way(10),
            0,
            way.access.unwrap(),
            &junction_ids,
        );
        assert_eq!(node.paths.len(), 1);
        assert_eq!(node.paths[0].target_id, way.nodes[2].id());

        // From the last node, nothing goes backward.
        let mut node = RouteNode::new(way.nodes[2].id(), way.nodes[2].coord);
        calculate_way_paths(
            &mut node,
            &way,
            ObjectFileRef::way(10),
            0,
            way.access.unwrap(),
            &junction_ids,
        );
        assert!(node.paths.is_empty());
    }

    #[test]
    fn circular_way_walks_both_directions() {
        let mut nodes = vec![
            pt(1, 0.0, 0.0),
            pt(2, 0.0, 0.03),
            pt(3, 0.01, 0.04),
            pt(4, 0.01, 0.0),
        ];
        nodes.push(nodes[0]);
        let way = plain_way(nodes);
        assert!(way.is_circular());

        // Junctions at index 0 and 2; from index 2, the two ring arcs both
        // end at node 0.
        let junction_ids: BTreeSet<NodeId> = [way.nodes[0].id(), way.nodes[2].id()]
            .into_iter()
            .collect();

        let mut node = RouteNode::new(way.nodes[2].id(), way.nodes[2].coord);
        calculate_circular_way_paths(
            &mut node,
            &way,
            ObjectFileRef::way(10),
            0,
            way.access.unwrap(),
            &junction_ids,
        );

        assert_eq!(node.paths.len(), 2);
        assert_eq!(node.paths[0].target_id, way.nodes[0].id());
        assert_eq!(node.paths[1].target_id, way.nodes[0].id());

        // The two arcs together cover the whole ring once.
        let perimeter: f64 = (0..4)
            .map(|i| way.nodes[i].coord.distance_to(way.nodes[i + 1].coord))
            .sum();
        let total = node.paths[0].distance_m + node.paths[1].distance_m;
        assert!((total - perimeter).abs() < 1e-6);
    }

    #[test]
    fn oneway_ring_only_walks_forward() {
        let mut nodes = vec![
            pt(1, 0.0, 0.0),
            pt(2, 0.0, 0.03),
            pt(3, 0.01, 0.04),
            pt(4, 0.01, 0.0),
        ];
        nodes.push(nodes[0]);
        let way = Way {
            access: Some(AccessValue::bidirectional(false, false, true).oneway_for(Vehicle::Car)),
            ..plain_way(nodes)
        };

        let junction_ids: BTreeSet<NodeId> = [way.nodes[0].id(), way.nodes[2].id()]
            .into_iter()
            .collect();

        let mut node = RouteNode::new(way.nodes[2].id(), way.nodes[2].coord);
        calculate_circular_way_paths(
            &mut node,
            &way,
            ObjectFileRef::way(10),
            0,
            way.access.unwrap(),
            &junction_ids,
        );

        assert_eq!(node.paths.len(), 1);
        assert_eq!(node.paths[0].target_id, way.nodes[0].id());
    }

    #[test]
    fn excludes_point_at_forbidden_way() {
        use map_data::TurnRestrictionKind;

        let from = ObjectFileRef::way(10);
        let to = ObjectFileRef::way(20);
        let other = ObjectFileRef::way(30);

        let mut node = RouteNode::new(42, GeoCoord::new(0.0, 0.0));
        let to_index = node.add_object(to, 0);
        let other_index = node.add_object(other, 0);
        node.paths.push(RoutePath {
            target_id: 1,
            object_index: to_index,
            flags: flags::USABLE_BY_CAR,
            distance_m: 10.0,
        });
        node.paths.push(RoutePath {
            target_id: 2,
            object_index: other_index,
            flags: flags::USABLE_BY_CAR,
            distance_m: 10.0,
        });

        let mut restrictions = ViaTurnRestrictions::new();
        restrictions.insert(
            42,
            vec![crate::restrictions::TurnRestrictionData {
                kind: TurnRestrictionKind::Forbid,
                from_way_offset: from.offset,
                to_way_offset: to.offset,
            }],
        );

        fill_route_path_excludes(&mut node, &[from, to, other], &restrictions);

        assert_eq!(
            node.excludes,
            vec![RouteExclude {
                source: from,
                target_index: 0,
            }]
        );
    }
}
