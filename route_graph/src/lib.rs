//! Derives the routing graph from the raw ways and areas: junction
//! discovery, per-vehicle edge derivation with access flags, turn
//! restriction materialization, and the tiled on-disk route-node format the
//! router reads at query time.

#[macro_use]
extern crate log;

mod builder;
mod discovery;
mod edges;
mod reader;
mod restrictions;
mod route_node;
mod tiles;

pub use crate::builder::build_route_graph;
pub use crate::discovery::{read_intersections_file, write_intersections_file, Intersection};
pub use crate::reader::RouteNodeFile;
pub use crate::restrictions::{can_turn, resolve_turn_restrictions, TurnRestrictionData, ViaTurnRestrictions};
pub use crate::route_node::{
    flags, read_object_variants, write_object_variants, ObjectVariant, RouteExclude, RouteNode,
    RouteObject, RoutePath,
};
pub use crate::tiles::{tile_of, Tile};
