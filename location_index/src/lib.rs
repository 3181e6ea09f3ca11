//! The hierarchical location index: administrative boundaries and populated
//! places form a region tree, streets and addresses hang off their deepest
//! containing region, and the whole thing serializes into one `location.idx`
//! file with back-patched offsets.

#[macro_use]
extern crate log;

mod builder;
mod grid;
mod ignore_tokens;
mod reader;
mod region;
mod writer;

pub use crate::builder::build_location_index;
pub use crate::grid::{region_at, region_at_mut, RegionGrid, RegionPath, REGION_GRID_LEVEL};
pub use crate::reader::{IndexRegion, LocationIndex, RegionData, RegionLocationEntry};
pub use crate::region::{Region, RegionAddress, RegionAlias, RegionLocation, RegionPoi};
pub use crate::writer::write_location_index;
