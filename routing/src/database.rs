use std::sync::Arc;

use anyhow::{Context, Result};
use map_data::{
    object_variants_filename, route_nodes_filename, Area, NodeId, TypeConfig, Vehicle, Way,
    AREAS_DAT, WAYS_DAT,
};
use osmio::{FileOffset, FileScanner, ScannerMode};
use route_graph::{read_object_variants, ObjectVariant, RouteNode, RouteNodeFile};

pub type DatabaseId = u32;

/// A node addressed across databases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DbId {
    pub database: DatabaseId,
    pub id: NodeId,
}

impl DbId {
    pub fn new(database: DatabaseId, id: NodeId) -> DbId {
        DbId { database, id }
    }
}

/// One opened map database, holding the vehicle's route-node file, the
/// variant sidecar, and scanners over the raw way/area data for seeds and
/// route materialization. Each concurrent query gets its own instance.
pub struct RoutingDatabase {
    directory: String,
    type_config: TypeConfig,
    nodes: RouteNodeFile,
    variants: Vec<ObjectVariant>,
    way_scanner: FileScanner,
    area_scanner: FileScanner,
}

impl RoutingDatabase {
    pub fn open(directory: &str, vehicle: Vehicle, type_config: TypeConfig) -> Result<RoutingDatabase> {
        let nodes_path = format!("{}/{}", directory, route_nodes_filename(vehicle));
        let nodes = RouteNodeFile::open(&nodes_path, false)
            .with_context(|| format!("opening {}", nodes_path))?;

        let variants_path = format!("{}/{}", directory, object_variants_filename(vehicle));
        let variants = read_object_variants(&variants_path)
            .with_context(|| format!("opening {}", variants_path))?;

        let ways_path = format!("{}/{}", directory, WAYS_DAT);
        let way_scanner = FileScanner::open(&ways_path, ScannerMode::Random, false)
            .with_context(|| format!("opening {}", ways_path))?;
        let areas_path = format!("{}/{}", directory, AREAS_DAT);
        let area_scanner = FileScanner::open(&areas_path, ScannerMode::Random, false)
            .with_context(|| format!("opening {}", areas_path))?;

        Ok(RoutingDatabase {
            directory: directory.to_string(),
            type_config,
            nodes,
            variants,
            way_scanner,
            area_scanner,
        })
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn type_config(&self) -> &TypeConfig {
        &self.type_config
    }

    pub fn route_node(&mut self, id: NodeId) -> Result<Option<Arc<RouteNode>>> {
        self.nodes.node_by_id(id)
    }

    pub fn variant(&self, index: u16) -> ObjectVariant {
        self.variants[index as usize]
    }

    pub fn variant_of_path(&self, node: &RouteNode, path_index: usize) -> ObjectVariant {
        self.variant(node.objects[node.paths[path_index].object_index].variant_index)
    }

    pub fn way(&mut self, offset: FileOffset) -> Result<Way> {
        self.way_scanner.seek(offset)?;
        Ok(Way::read(&mut self.way_scanner)?)
    }

    pub fn area(&mut self, offset: FileOffset) -> Result<Area> {
        self.area_scanner.seek(offset)?;
        Ok(Area::read(&mut self.area_scanner)?)
    }

    /// The effective access of a way, falling back to its type's default.
    pub fn access_of(&self, way: &Way) -> map_data::AccessValue {
        way.access
            .unwrap_or_else(|| self.type_config.get(way.type_id).default_access)
    }

    pub(crate) fn all_node_ids(&mut self) -> Result<Vec<NodeId>> {
        self.nodes.all_ids()
    }
}
