//! The A* search. Open set: a sorted set of `(overall cost, node)` keys with
//! a parallel map for decrease-key. Closed sets: one for nodes reached over
//! open roads, one for nodes reached through destination-only access, so a
//! node can be revisited under the other regime.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use geom::GeoCoord;
use map_data::{NodeId, ObjectFileRef, RefType, Way};
use ordered_float::OrderedFloat;
use route_graph::RouteNode;

use crate::breaker::{Breaker, RoutingProgress};
use crate::database::{DatabaseId, DbId, RoutingDatabase};
use crate::profile::RoutingProfile;
use crate::result::{RoutePosition, RoutingResult, Termination};

/// Per-call options.
pub struct RoutingParameter<'a> {
    pub breaker: Option<&'a dyn Breaker>,
    pub progress: Option<&'a mut dyn RoutingProgress>,
    pub cost_limit_override: Option<f64>,
}

impl<'a> Default for RoutingParameter<'a> {
    fn default() -> RoutingParameter<'a> {
        RoutingParameter {
            breaker: None,
            progress: None,
            cost_limit_override: None,
        }
    }
}

/// A node on the open list.
struct RNode {
    node: Arc<RouteNode>,
    /// Object we arrived over; None for database transitions and so for
    /// nothing a turn restriction could bind to.
    object: Option<ObjectFileRef>,
    prev: Option<DbId>,
    current_cost: f64,
    overall_cost: f64,
    /// False when the node was entered through a destination-only edge.
    access: bool,
}

/// A visited node, as remembered by the closed sets.
#[derive(Clone, Debug)]
pub(crate) struct VNode {
    pub at: DbId,
    pub object: Option<ObjectFileRef>,
    pub prev: Option<DbId>,
}

type OpenKey = (OrderedFloat<f64>, DbId);

/// The router over one or more databases. Databases are joined at shared
/// node ids ("twins"); the transition between twins is a zero-cost edge.
pub struct RoutingService {
    pub(crate) databases: Vec<RoutingDatabase>,
    pub(crate) profiles: Vec<RoutingProfile>,
    twins: HashMap<NodeId, Vec<DatabaseId>>,
}

impl RoutingService {
    pub fn new(database: RoutingDatabase, profile: RoutingProfile) -> RoutingService {
        RoutingService {
            databases: vec![database],
            profiles: vec![profile],
            twins: HashMap::new(),
        }
    }

    /// Multi-database mode: every id present in more than one database
    /// becomes a twin pair the search may cross for free.
    pub fn with_databases(
        mut databases: Vec<RoutingDatabase>,
        profiles: Vec<RoutingProfile>,
    ) -> Result<RoutingService> {
        assert_eq!(databases.len(), profiles.len());

        let mut by_id: HashMap<NodeId, Vec<DatabaseId>> = HashMap::new();
        if databases.len() > 1 {
            for (db_index, database) in databases.iter_mut().enumerate() {
                for id in database.all_node_ids()? {
                    by_id.entry(id).or_default().push(db_index as DatabaseId);
                }
            }
            by_id.retain(|_, dbs| dbs.len() > 1);
        }
        info!("{} twin id(s) across databases", by_id.len());

        Ok(RoutingService {
            databases,
            profiles,
            twins: by_id,
        })
    }

    pub fn profile(&self, database: DatabaseId) -> &RoutingProfile {
        &self.profiles[database as usize]
    }

    fn bad_input(reason: impl Into<String>) -> RoutingResult {
        RoutingResult::unroutable(Termination::BadInput {
            reason: reason.into(),
        })
    }

    /// Next route node along the way, searching forward from `from`.
    fn forward_route_node(
        &mut self,
        database: DatabaseId,
        way: &Way,
        from: usize,
    ) -> Result<Option<(usize, Arc<RouteNode>)>> {
        for idx in from..way.nodes.len() {
            if let Some(node) = self.databases[database as usize].route_node(way.nodes[idx].id())? {
                return Ok(Some((idx, node)));
            }
        }
        Ok(None)
    }

    /// Next route node along the way, searching backward from just before
    /// `from`.
    fn backward_route_node(
        &mut self,
        database: DatabaseId,
        way: &Way,
        from: usize,
    ) -> Result<Option<(usize, Arc<RouteNode>)>> {
        for idx in (0..from).rev() {
            if let Some(node) = self.databases[database as usize].route_node(way.nodes[idx].id())? {
                return Ok(Some((idx, node)));
            }
        }
        Ok(None)
    }

    pub fn calculate_route(
        &mut self,
        start: RoutePosition,
        target: RoutePosition,
        parameter: &mut RoutingParameter,
    ) -> Result<RoutingResult> {
        if start.object.typ != RefType::Way || target.object.typ != RefType::Way {
            return Ok(Self::bad_input("start and target must be ways"));
        }
        if start.database as usize >= self.databases.len()
            || target.database as usize >= self.databases.len()
        {
            return Ok(Self::bad_input("no such database"));
        }

        // Target seeds: the route nodes from which the target is reachable
        // along its way, one per direction.
        let target_way = self.databases[target.database as usize].way(target.object.offset)?;
        if target.node_index >= target_way.nodes.len() {
            return Ok(Self::bad_input("target node index out of range"));
        }
        let target_coord = target_way.nodes[target.node_index].coord;
        let target_access = self.databases[target.database as usize].access_of(&target_way);
        let target_vehicle = self.profiles[target.database as usize].vehicle();

        let mut target_forward_id = None;
        let mut target_backward_id = None;
        let direct_id = target_way.nodes[target.node_index].id();
        if self.databases[target.database as usize]
            .route_node(direct_id)?
            .is_some()
        {
            target_forward_id = Some(direct_id);
        } else {
            if target_access.can_route_forward(target_vehicle) {
                target_forward_id = self
                    .backward_route_node(target.database, &target_way, target.node_index)?
                    .map(|(_, node)| node.id);
            }
            if target_access.can_route_backward(target_vehicle) {
                target_backward_id = self
                    .forward_route_node(target.database, &target_way, target.node_index)?
                    .map(|(_, node)| node.id);
            }
        }
        if target_forward_id.is_none() && target_backward_id.is_none() {
            debug!("No route node found for the target way");
            return Ok(RoutingResult::unroutable(Termination::NoRouteFound));
        }

        // Start seeds, with the cost of the partial way segment already paid.
        let start_way = self.databases[start.database as usize].way(start.object.offset)?;
        if start.node_index >= start_way.nodes.len() {
            return Ok(Self::bad_input("start node index out of range"));
        }
        let start_coord = start_way.nodes[start.node_index].coord;
        let start_access = self.databases[start.database as usize].access_of(&start_way);
        let start_vehicle = self.profiles[start.database as usize].vehicle();
        let start_variant = route_graph::ObjectVariant {
            type_id: start_way.type_id,
            max_speed: start_way.max_speed,
            grade: start_way.grade,
        };

        let mut seeds: Vec<(usize, Arc<RouteNode>)> = Vec::new();
        let direct_id = start_way.nodes[start.node_index].id();
        if let Some(node) = self.databases[start.database as usize].route_node(direct_id)? {
            seeds.push((start.node_index, node));
        } else {
            if start_access.can_route_forward(start_vehicle) {
                if let Some(seed) =
                    self.forward_route_node(start.database, &start_way, start.node_index)?
                {
                    seeds.push(seed);
                }
            }
            if start_access.can_route_backward(start_vehicle) {
                if let Some(seed) =
                    self.backward_route_node(start.database, &start_way, start.node_index)?
                {
                    seeds.push(seed);
                }
            }
        }
        if seeds.is_empty() {
            debug!("No route node found for the start way");
            return Ok(RoutingResult::unroutable(Termination::NoRouteFound));
        }

        let overall_distance = start_coord.distance_to(target_coord);
        let cost_limit = parameter.cost_limit_override.unwrap_or_else(|| {
            self.profiles[start.database as usize].cost_limit(overall_distance)
        });

        let mut open_list: BTreeSet<OpenKey> = BTreeSet::new();
        let mut open_map: HashMap<DbId, RNode> = HashMap::new();
        let mut closed: HashMap<DbId, VNode> = HashMap::new();
        let mut closed_restricted: HashMap<DbId, VNode> = HashMap::new();

        {
            let profile = &self.profiles[start.database as usize];
            for (seed_index, seed_node) in seeds {
                let at = DbId::new(start.database, seed_node.id);
                let current_cost = profile.edge_cost(
                    start_variant,
                    start_coord.distance_to(start_way.nodes[seed_index].coord),
                );
                let estimate = profile.cost_of_distance(seed_node.coord.distance_to(target_coord));
                let overall_cost = current_cost + estimate;
                match open_map.get(&at) {
                    Some(existing) if existing.current_cost <= current_cost => continue,
                    Some(existing) => {
                        open_list.remove(&(OrderedFloat(existing.overall_cost), at));
                    }
                    None => {}
                }
                open_list.insert((OrderedFloat(overall_cost), at));
                open_map.insert(
                    at,
                    RNode {
                        node: seed_node,
                        object: Some(start.object),
                        prev: None,
                        current_cost,
                        overall_cost,
                        access: true,
                    },
                );
            }
        }

        let mut current_max_distance: f64 = 0.0;
        let mut target_forward_found = target_forward_id.is_none();
        let mut target_backward_found = target_backward_id.is_none();
        let mut forward_finisher: Option<(f64, DbId)> = None;
        let mut backward_finisher: Option<(f64, DbId)> = None;

        while let Some(&(_, at)) = open_list.iter().next() {
            if let Some(breaker) = parameter.breaker {
                if breaker.is_aborted() {
                    let mut result = RoutingResult::unroutable(Termination::Cancelled);
                    result.overall_distance = overall_distance;
                    result.current_max_distance = current_max_distance;
                    return Ok(result);
                }
            }

            let current = open_map.remove(&at).unwrap();
            open_list.remove(&(OrderedFloat(current.overall_cost), at));

            self.walk_paths(
                &current,
                at,
                target_coord,
                cost_limit,
                overall_distance,
                &mut current_max_distance,
                &mut open_list,
                &mut open_map,
                &closed,
                &closed_restricted,
                parameter,
            )?;

            self.walk_to_other_databases(
                &current,
                at,
                &mut open_list,
                &mut open_map,
                &closed,
                &closed_restricted,
            )?;

            let vnode = VNode {
                at,
                object: current.object,
                prev: current.prev,
            };
            if current.access {
                closed.insert(at, vnode);
            } else {
                closed_restricted.insert(at, vnode);
            }

            if !target_forward_found
                && Some(at.id) == target_forward_id
                && at.database == target.database
            {
                target_forward_found = true;
                forward_finisher = Some((current.current_cost, at));
            }
            if !target_backward_found
                && Some(at.id) == target_backward_id
                && at.database == target.database
            {
                target_backward_found = true;
                backward_finisher = Some((current.current_cost, at));
            }
            if target_forward_found && target_backward_found {
                break;
            }
        }

        let finisher = match (forward_finisher, backward_finisher) {
            (Some(f), Some(b)) => Some(if f.0 <= b.0 { f } else { b }),
            (Some(f), None) => Some(f),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        let (_, finisher_at) = match finisher {
            Some(finisher) => finisher,
            None => {
                let mut result = RoutingResult::unroutable(Termination::NoRouteFound);
                result.overall_distance = overall_distance;
                result.current_max_distance = current_max_distance;
                return Ok(result);
            }
        };

        // Walk the prev chain back to the start seed.
        let mut chain = Vec::new();
        let mut cursor = Some(finisher_at);
        while let Some(at) = cursor {
            let vnode = closed
                .get(&at)
                .or_else(|| closed_restricted.get(&at))
                .expect("closed chain is broken");
            chain.push(vnode.clone());
            cursor = vnode.prev;
        }
        chain.reverse();

        let route = self.resolve_route_nodes_to_route_data(&chain, start, target)?;

        Ok(RoutingResult {
            route: Some(route),
            termination: Termination::Found,
            overall_distance,
            current_max_distance: overall_distance,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_paths(
        &mut self,
        current: &RNode,
        at: DbId,
        target_coord: GeoCoord,
        cost_limit: f64,
        overall_distance: f64,
        current_max_distance: &mut f64,
        open_list: &mut BTreeSet<OpenKey>,
        open_map: &mut HashMap<DbId, RNode>,
        closed: &HashMap<DbId, VNode>,
        closed_restricted: &HashMap<DbId, VNode>,
        parameter: &mut RoutingParameter,
    ) -> Result<()> {
        let database_index = at.database as usize;
        let vehicle = self.profiles[database_index].vehicle();

        for (path_index, path) in current.node.paths.iter().enumerate() {
            let next_at = DbId::new(at.database, path.target_id);

            // Don't bounce straight back.
            if Some(next_at) == current.prev {
                continue;
            }

            // Once inside a destination-only zone, only destination-only
            // edges may be used; leaving onto an open road would mean
            // passing through.
            if !current.access && !path.is_restricted_for(vehicle) {
                continue;
            }

            let variant = self.databases[database_index].variant_of_path(&current.node, path_index);
            if !self.profiles[database_index].can_use(path, variant) {
                continue;
            }

            if (current.access && closed.contains_key(&next_at))
                || (!current.access && closed_restricted.contains_key(&next_at))
            {
                continue;
            }

            if !current.node.excludes.is_empty() {
                let path_object = current.node.object_of_path(path_index);
                let banned = current.node.excludes.iter().any(|exclude| {
                    Some(exclude.source) == current.object
                        && current.node.object_of_path(exclude.target_index) == path_object
                });
                if banned {
                    continue;
                }
            }

            let new_cost = current.current_cost
                + self.profiles[database_index].edge_cost(variant, path.distance_m);

            if let Some(existing) = open_map.get(&next_at) {
                if existing.current_cost <= new_cost {
                    continue;
                }
            }

            let next_node = match open_map.get(&next_at) {
                Some(existing) => existing.node.clone(),
                None => match self.databases[database_index].route_node(path.target_id)? {
                    Some(node) => node,
                    None => {
                        error!("Cannot load route node {}", path.target_id);
                        continue;
                    }
                },
            };

            let distance_to_target = next_node.coord.distance_to(target_coord);
            *current_max_distance =
                current_max_distance.max(overall_distance - distance_to_target);

            let estimate = self.profiles[database_index].cost_of_distance(distance_to_target);
            let overall_cost = new_cost + estimate;
            if overall_cost > cost_limit {
                continue;
            }

            if let Some(progress) = parameter.progress.as_mut() {
                progress.progress(*current_max_distance, overall_distance);
            }

            let access = !path.is_restricted_for(vehicle);
            let object = Some(current.node.object_of_path(path_index));

            if let Some(existing) = open_map.get_mut(&next_at) {
                open_list.remove(&(OrderedFloat(existing.overall_cost), next_at));
                existing.prev = Some(at);
                existing.object = object;
                existing.current_cost = new_cost;
                existing.overall_cost = overall_cost;
                existing.access = access;
                open_list.insert((OrderedFloat(overall_cost), next_at));
            } else {
                open_list.insert((OrderedFloat(overall_cost), next_at));
                open_map.insert(
                    next_at,
                    RNode {
                        node: next_node,
                        object,
                        prev: Some(at),
                        current_cost: new_cost,
                        overall_cost,
                        access,
                    },
                );
            }
        }

        Ok(())
    }

    /// Imports the current node's twins from other databases as zero-cost
    /// transitions.
    fn walk_to_other_databases(
        &mut self,
        current: &RNode,
        at: DbId,
        open_list: &mut BTreeSet<OpenKey>,
        open_map: &mut HashMap<DbId, RNode>,
        closed: &HashMap<DbId, VNode>,
        closed_restricted: &HashMap<DbId, VNode>,
    ) -> Result<()> {
        let twin_databases = match self.twins.get(&at.id) {
            Some(dbs) => dbs.clone(),
            None => return Ok(()),
        };

        for other in twin_databases {
            if other == at.database {
                continue;
            }
            let twin = DbId::new(other, at.id);

            if (current.access && closed.contains_key(&twin))
                || (!current.access && closed_restricted.contains_key(&twin))
            {
                continue;
            }

            if let Some(existing) = open_map.get_mut(&twin) {
                if existing.current_cost > current.current_cost {
                    open_list.remove(&(OrderedFloat(existing.overall_cost), twin));
                    existing.prev = Some(at);
                    existing.object = None;
                    existing.current_cost = current.current_cost;
                    existing.overall_cost = current.overall_cost;
                    existing.access = current.access;
                    open_list.insert((OrderedFloat(existing.overall_cost), twin));
                }
            } else {
                let node = match self.databases[other as usize].route_node(at.id)? {
                    Some(node) => node,
                    None => continue,
                };
                open_list.insert((OrderedFloat(current.overall_cost), twin));
                open_map.insert(
                    twin,
                    RNode {
                        node,
                        object: None,
                        prev: Some(at),
                        current_cost: current.current_cost,
                        overall_cost: current.overall_cost,
                        access: current.access,
                    },
                );
            }
        }

        Ok(())
    }
}
