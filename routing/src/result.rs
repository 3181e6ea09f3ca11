use geom::GeoCoord;
use map_data::{NodeId, ObjectFileRef};

use crate::database::DatabaseId;

/// Where a route starts or ends: an object (currently always a way), the
/// index of a node on it, and the database it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutePosition {
    pub object: ObjectFileRef,
    pub node_index: usize,
    pub database: DatabaseId,
}

impl RoutePosition {
    pub fn new(object: ObjectFileRef, node_index: usize, database: DatabaseId) -> RoutePosition {
        RoutePosition {
            object,
            node_index,
            database,
        }
    }
}

/// One hop of the dense route: from `current_node_index` to
/// `target_node_index` on `object`. The final entry carries no object.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteEntry {
    pub database: DatabaseId,
    /// The stable id of the node at `current_node_index`; 0 for
    /// interior entries where it isn't needed.
    pub current_node_id: NodeId,
    pub current_node_index: usize,
    pub object: Option<ObjectFileRef>,
    pub target_node_index: usize,
}

/// The dense, per-node route produced by materialization. Every skipped
/// intermediate node of the underlying ways is present again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteData {
    pub entries: Vec<RouteEntry>,
}

impl RouteData {
    pub fn add_entry(
        &mut self,
        database: DatabaseId,
        current_node_id: NodeId,
        current_node_index: usize,
        object: Option<ObjectFileRef>,
        target_node_index: usize,
    ) {
        self.entries.push(RouteEntry {
            database,
            current_node_id,
            current_node_index,
            object,
            target_node_index,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why the router returned. Everything except `Found` is a value-level
/// outcome, not an error: I/O and format failures are real errors and
/// surface through `Result` instead.
#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    Found,
    NoRouteFound,
    Cancelled,
    BadInput { reason: String },
}

/// The result of one `calculate_route` call. `current_max_distance` tracks
/// how far towards the target the search got, for progress feedback even on
/// failure.
#[derive(Clone, Debug)]
pub struct RoutingResult {
    pub route: Option<RouteData>,
    pub termination: Termination,
    pub overall_distance: f64,
    pub current_max_distance: f64,
}

impl RoutingResult {
    pub(crate) fn unroutable(termination: Termination) -> RoutingResult {
        RoutingResult {
            route: None,
            termination,
            overall_distance: 0.0,
            current_max_distance: 0.0,
        }
    }

    pub fn success(&self) -> bool {
        self.route.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Start,
    /// The route switches onto another object here.
    Transition,
    Target,
}

/// One abstract step of a route description.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteStep {
    pub kind: StepKind,
    pub coord: GeoCoord,
    pub object: Option<ObjectFileRef>,
    /// Meters traveled from the start to this step.
    pub distance: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteDescription {
    pub steps: Vec<RouteStep>,
}

impl RouteDescription {
    pub fn total_distance(&self) -> f64 {
        self.steps.last().map(|step| step.distance).unwrap_or(0.0)
    }
}
