//! The online router: A* over the tiled route-node graph, per-vehicle cost
//! profiles, cooperative cancellation, optional multi-database operation
//! joined at shared node ids, and the transforms turning a raw route back
//! into points, a way, or a step list.

#[macro_use]
extern crate log;

mod breaker;
mod database;
mod materialize;
mod profile;
mod result;
mod service;

pub use crate::breaker::{Breaker, RoutingProgress, ThreadedBreaker};
pub use crate::database::{DatabaseId, DbId, RoutingDatabase};
pub use crate::profile::{CostMode, RoutingProfile};
pub use crate::result::{
    RouteData, RouteDescription, RouteEntry, RoutePosition, RouteStep, RoutingResult, StepKind,
    Termination,
};
pub use crate::service::{RoutingParameter, RoutingService};
