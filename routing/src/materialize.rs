//! Turns the chain of visited route nodes back into a dense per-node route:
//! every intermediate node the graph skipped over is expanded again, so the
//! result can be rendered or narrated directly.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use map_data::{NodeId, ObjectFileRef, Point, RefType, Way};

use crate::database::DatabaseId;
use crate::result::{RouteData, RouteDescription, RouteStep, RoutePosition, StepKind};
use crate::service::{RoutingService, VNode};

/// The node list of one way or area ring, plus whether it may only be
/// traversed in its natural direction.
struct ObjectNodes {
    nodes: Vec<Point>,
    oneway: bool,
}

type ObjectCache = HashMap<(DatabaseId, ObjectFileRef), ObjectNodes>;

fn load_object<'c>(
    service: &mut RoutingService,
    cache: &'c mut ObjectCache,
    database: DatabaseId,
    object: ObjectFileRef,
) -> Result<&'c ObjectNodes> {
    if !cache.contains_key(&(database, object)) {
        let loaded = match object.typ {
            RefType::Way => {
                let way = service.databases[database as usize].way(object.offset)?;
                let vehicle = service.profiles[database as usize].vehicle();
                let oneway = !service.databases[database as usize]
                    .access_of(&way)
                    .can_route_backward(vehicle);
                ObjectNodes {
                    nodes: way.nodes,
                    oneway,
                }
            }
            RefType::Area => {
                let area = service.databases[database as usize].area(object.offset)?;
                let ring = area
                    .rings
                    .into_iter()
                    .next()
                    .context("area without rings on route")?;
                ObjectNodes {
                    nodes: ring.nodes,
                    oneway: false,
                }
            }
            RefType::Node => bail!("a node object cannot carry a route"),
        };
        cache.insert((database, object), loaded);
    }
    Ok(cache.get(&(database, object)).unwrap())
}

fn position_of(nodes: &[Point], id: NodeId) -> Result<usize> {
    nodes
        .iter()
        .position(|p| p.id() == id)
        .with_context(|| format!("node {} not found on route object", id))
}

/// Expands the hop from `start_index` to `target_index` on one object into
/// per-segment entries. Walking against the natural direction of a one-way
/// object means wrapping around its ring instead.
#[allow(clippy::too_many_arguments)]
fn add_nodes(
    route: &mut RouteData,
    database: DatabaseId,
    start_node_id: NodeId,
    start_index: usize,
    object: ObjectFileRef,
    id_count: usize,
    oneway: bool,
    target_index: usize,
) {
    assert!(start_index < id_count);
    assert!(target_index < id_count);

    if start_index.max(target_index) - start_index.min(target_index) == 1 {
        // From one node to its direct neighbor
        route.add_entry(database, start_node_id, start_index, Some(object), target_index);
    } else if start_index < target_index {
        // Following the way
        route.add_entry(
            database,
            start_node_id,
            start_index,
            Some(object),
            start_index + 1,
        );
        for i in start_index + 1..target_index - 1 {
            route.add_entry(database, 0, i, Some(object), i + 1);
        }
        route.add_entry(database, 0, target_index - 1, Some(object), target_index);
    } else if oneway {
        // Against a one-way: wrap around the ring
        let mut pos = start_index + 1;
        if pos >= id_count {
            pos = 0;
        }
        let mut next = pos + 1;
        if next >= id_count {
            next = 0;
        }

        route.add_entry(database, start_node_id, start_index, Some(object), pos);
        while next != target_index {
            route.add_entry(database, 0, pos, Some(object), next);
            pos += 1;
            if pos >= id_count {
                pos = 0;
            }
            next = pos + 1;
            if next >= id_count {
                next = 0;
            }
        }
        route.add_entry(database, 0, pos, Some(object), target_index);
    } else {
        // Following the way backwards
        route.add_entry(
            database,
            start_node_id,
            start_index,
            Some(object),
            start_index - 1,
        );
        let mut i = start_index - 1;
        while i > target_index + 1 {
            route.add_entry(database, 0, i, Some(object), i - 1);
            i -= 1;
        }
        route.add_entry(database, 0, target_index + 1, Some(object), target_index);
    }
}

impl RoutingService {
    pub(crate) fn resolve_route_nodes_to_route_data(
        &mut self,
        chain: &[VNode],
        start: RoutePosition,
        target: RoutePosition,
    ) -> Result<RouteData> {
        let mut cache = ObjectCache::new();
        let mut route = RouteData::default();

        // The start object, with everything copied out so the cache borrow
        // ends here.
        let (start_node_id, start_len, start_oneway) = {
            let on = load_object(self, &mut cache, start.database, start.object)?;
            (
                on.nodes[start.node_index].id(),
                on.nodes.len(),
                on.oneway,
            )
        };

        if chain.is_empty() {
            // Start and target sit on the same object with no route node in
            // between.
            if start.object != target.object {
                bail!("empty route chain between different objects");
            }
            add_nodes(
                &mut route,
                start.database,
                start_node_id,
                start.node_index,
                start.object,
                start_len,
                start_oneway,
                target.node_index,
            );
            route.add_entry(target.database, 0, target.node_index, None, 0);
            return Ok(route);
        }

        // The fragment from the start position to the first route node.
        let first_id = chain[0].at.id;
        if start_node_id != first_id {
            let first_index = {
                let on = load_object(self, &mut cache, start.database, start.object)?;
                position_of(&on.nodes, first_id)?
            };
            add_nodes(
                &mut route,
                start.database,
                start_node_id,
                start.node_index,
                start.object,
                start_len,
                start_oneway,
                first_index,
            );
        }

        for (n, vnode) in chain.iter().enumerate() {
            let node_id = vnode.at.id;

            if n + 1 == chain.len() {
                // The fragment from the last route node to the target, plus
                // the terminating entry.
                let (current_index, target_len, target_oneway) = {
                    let on = load_object(self, &mut cache, target.database, target.object)?;
                    (position_of(&on.nodes, node_id)?, on.nodes.len(), on.oneway)
                };
                if current_index != target.node_index {
                    add_nodes(
                        &mut route,
                        target.database,
                        node_id,
                        current_index,
                        target.object,
                        target_len,
                        target_oneway,
                        target.node_index,
                    );
                }
                route.add_entry(target.database, 0, target.node_index, None, 0);
                break;
            }

            let next = &chain[n + 1];

            // A twin transition: same physical node in another database,
            // no geometry in between.
            if vnode.at.database != next.at.database && node_id == next.at.id {
                continue;
            }

            let object = next
                .object
                .context("route node arrived without an object")?;
            let (current_index, next_index, len, oneway) = {
                let on = load_object(self, &mut cache, next.at.database, object)?;
                (
                    position_of(&on.nodes, node_id)?,
                    position_of(&on.nodes, next.at.id)?,
                    on.nodes.len(),
                    on.oneway,
                )
            };
            add_nodes(
                &mut route,
                next.at.database,
                node_id,
                current_index,
                object,
                len,
                oneway,
                next_index,
            );
        }

        Ok(route)
    }

    /// The dense polyline of the route.
    pub fn route_to_points(&mut self, route: &RouteData) -> Result<Vec<Point>> {
        let mut cache = ObjectCache::new();
        let mut points: Vec<Point> = Vec::new();

        for entry in &route.entries {
            let object = match entry.object {
                Some(object) => object,
                None => continue,
            };
            let on = load_object(self, &mut cache, entry.database, object)?;
            if points.is_empty() {
                points.push(on.nodes[entry.current_node_index]);
            }
            let next = on.nodes[entry.target_node_index];
            if points.last().map(|p| p.id()) != Some(next.id()) {
                points.push(next);
            }
        }

        Ok(points)
    }

    /// Wraps the polyline as a synthetic way, ready for rendering.
    pub fn route_to_way(&mut self, route: &RouteData) -> Result<Way> {
        let nodes = self.route_to_points(route)?;
        Ok(Way {
            type_id: 0,
            name: None,
            address: None,
            access: None,
            restricted: None,
            max_speed: 0,
            grade: 1,
            nodes,
        })
    }

    /// The abstract step list: start, one transition per object change,
    /// target. Distances are cumulative meters.
    pub fn route_to_description(&mut self, route: &RouteData) -> Result<RouteDescription> {
        let mut cache = ObjectCache::new();
        let mut description = RouteDescription::default();
        let mut distance = 0.0;
        let mut last_object: Option<ObjectFileRef> = None;
        let mut last_point: Option<Point> = None;

        for entry in &route.entries {
            let object = match entry.object {
                Some(object) => object,
                None => {
                    if let Some(last) = last_point {
                        description.steps.push(RouteStep {
                            kind: StepKind::Target,
                            coord: last.coord,
                            object: None,
                            distance,
                        });
                    }
                    continue;
                }
            };
            let on = load_object(self, &mut cache, entry.database, object)?;
            let from = on.nodes[entry.current_node_index];
            let to = on.nodes[entry.target_node_index];

            if description.steps.is_empty() {
                description.steps.push(RouteStep {
                    kind: StepKind::Start,
                    coord: from.coord,
                    object: Some(object),
                    distance: 0.0,
                });
            } else if last_object != Some(object) {
                description.steps.push(RouteStep {
                    kind: StepKind::Transition,
                    coord: from.coord,
                    object: Some(object),
                    distance,
                });
            }

            distance += from.coord.distance_to(to.coord);
            last_object = Some(object);
            last_point = Some(to);
        }

        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_nodes_forward_expands_every_segment() {
        let mut route = RouteData::default();
        add_nodes(&mut route, 0, 42, 1, ObjectFileRef::way(7), 6, false, 4);
        let hops: Vec<(usize, usize)> = route
            .entries
            .iter()
            .map(|e| (e.current_node_index, e.target_node_index))
            .collect();
        assert_eq!(hops, vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(route.entries[0].current_node_id, 42);
        assert_eq!(route.entries[1].current_node_id, 0);
    }

    #[test]
    fn add_nodes_backward_expands_every_segment() {
        let mut route = RouteData::default();
        add_nodes(&mut route, 0, 42, 4, ObjectFileRef::way(7), 6, false, 1);
        let hops: Vec<(usize, usize)> = route
            .entries
            .iter()
            .map(|e| (e.current_node_index, e.target_node_index))
            .collect();
        assert_eq!(hops, vec![(4, 3), (3, 2), (2, 1)]);
    }

    #[test]
    fn add_nodes_oneway_wraps_around() {
        // Going "backwards" on a one-way ring of 5 nodes, from 3 to 1:
        // the route must wrap 3 -> 4 -> 0 -> 1.
        let mut route = RouteData::default();
        add_nodes(&mut route, 0, 42, 3, ObjectFileRef::way(7), 5, true, 1);
        let hops: Vec<(usize, usize)> = route
            .entries
            .iter()
            .map(|e| (e.current_node_index, e.target_node_index))
            .collect();
        assert_eq!(hops, vec![(3, 4), (4, 0), (0, 1)]);
    }

    #[test]
    fn add_nodes_neighbor_is_one_entry() {
        let mut route = RouteData::default();
        add_nodes(&mut route, 0, 42, 2, ObjectFileRef::way(7), 6, false, 3);
        assert_eq!(route.entries.len(), 1);
        let mut route = RouteData::default();
        add_nodes(&mut route, 0, 42, 3, ObjectFileRef::way(7), 6, true, 2);
        assert_eq!(route.entries.len(), 1);
    }
}
