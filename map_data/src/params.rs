use crate::access::Vehicle;

/// Knobs for the offline builders. One instance drives a whole import run.
#[derive(Clone, Debug)]
pub struct ImportParameter {
    /// Directory holding the intermediate `.dat` files; outputs land next to
    /// them.
    pub destination_directory: String,
    pub node_data_mmap: bool,
    pub way_data_mmap: bool,
    pub area_data_mmap: bool,
    /// Route nodes processed per block; bounds the memory of the preloaded
    /// way/area maps.
    pub route_node_block_size: usize,
    /// Magnification of the route-node tile grid (tiles are
    /// 360/2^mag degrees wide).
    pub route_node_tile_mag: u8,
    /// One route-node file is emitted per vehicle.
    pub vehicles: Vec<Vehicle>,
}

impl ImportParameter {
    pub fn new(destination_directory: impl Into<String>) -> ImportParameter {
        ImportParameter {
            destination_directory: destination_directory.into(),
            node_data_mmap: false,
            way_data_mmap: false,
            area_data_mmap: false,
            route_node_block_size: 500_000,
            route_node_tile_mag: 13,
            vehicles: vec![Vehicle::Foot, Vehicle::Bicycle, Vehicle::Car],
        }
    }

    pub fn file(&self, name: &str) -> String {
        format!("{}/{}", self.destination_directory, name)
    }
}
