//! Junction discovery: two sweeps over the routable ways and simple areas.
//! The first counts how often each network-shareable node id is used; ids
//! used by at least two objects are junction candidates. The second collects
//! the objects incident at each junction.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Context, Result};
use map_data::{
    Area, ImportParameter, Node, NodeId, ObjectFileRef, ObjectFileRefStreamReader,
    ObjectFileRefStreamWriter, Point, TypeConfig, Way, AREAS_DAT, INTERSECTIONS_DAT, NODES_DAT,
    WAYS_DAT,
};
use osmio::{FileScanner, FileWriter, ScannerMode};
use osmutil::Timer;

use crate::builder::access_of;

/// Tracks the unseen -> used once -> used many state per node id.
pub(crate) struct NodeUseMap {
    seen: HashSet<NodeId>,
    used_many: HashSet<NodeId>,
}

impl NodeUseMap {
    pub fn new() -> NodeUseMap {
        NodeUseMap {
            seen: HashSet::new(),
            used_many: HashSet::new(),
        }
    }

    pub fn set_used(&mut self, id: NodeId) {
        if !self.seen.insert(id) {
            self.used_many.insert(id);
        }
    }

    pub fn is_junction(&self, id: NodeId) -> bool {
        self.used_many.contains(&id)
    }

    pub fn junction_count(&self) -> usize {
        self.used_many.len()
    }
}

/// A junction and the objects meeting there. The coordinate isn't stored;
/// it's recoverable from the id, and the precise point comes from the way
/// data when the route node is written.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub id: NodeId,
    pub objects: Vec<ObjectFileRef>,
}

fn open_ways(parameter: &ImportParameter) -> Result<FileScanner> {
    let path = parameter.file(WAYS_DAT);
    FileScanner::open(&path, ScannerMode::Sequential, parameter.way_data_mmap)
        .with_context(|| format!("opening {}", path))
}

fn open_areas(parameter: &ImportParameter) -> Result<FileScanner> {
    let path = parameter.file(AREAS_DAT);
    FileScanner::open(&path, ScannerMode::Sequential, parameter.area_data_mmap)
        .with_context(|| format!("opening {}", path))
}

pub(crate) fn way_is_routable(config: &TypeConfig, way: &Way) -> bool {
    let info = config.get(way.type_id);
    if info.ignore {
        return false;
    }
    let access = access_of(config, way);
    access.any_forward() || access.any_backward()
}

pub(crate) fn area_is_routable(config: &TypeConfig, area: &Area) -> bool {
    let info = config.get(area.type_id);
    !info.ignore && info.can_route() && area.is_simple()
}

/// Sweep 1: find all node ids shared by at least two routable objects.
pub(crate) fn find_junction_ids(
    config: &TypeConfig,
    parameter: &ImportParameter,
    timer: &mut Timer,
) -> Result<NodeUseMap> {
    let mut use_map = NodeUseMap::new();

    let mut scanner = open_ways(parameter)?;
    let count = scanner.read_u32()?;
    timer.start_iter("scanning ways for junctions", count as usize);
    for _ in 0..count {
        timer.next();
        let way = Way::read(&mut scanner)?;
        if !way_is_routable(config, &way) {
            continue;
        }
        // A way may touch the same id twice (loops); that alone doesn't make
        // a junction.
        let mut ids_of_way = HashSet::new();
        for point in &way.nodes {
            if !point.is_relevant() {
                continue;
            }
            let id = point.id();
            if ids_of_way.insert(id) {
                use_map.set_used(id);
            }
        }
    }
    scanner.close()?;

    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    timer.start_iter("scanning areas for junctions", count as usize);
    for _ in 0..count {
        timer.next();
        let area = Area::read(&mut scanner)?;
        if !area_is_routable(config, &area) {
            continue;
        }
        let mut ids_of_area = HashSet::new();
        for point in &area.rings[0].nodes {
            if !point.is_relevant() {
                continue;
            }
            let id = point.id();
            if ids_of_area.insert(id) {
                use_map.set_used(id);
            }
        }
    }
    scanner.close()?;

    info!("Found {} junction candidate(s)", use_map.junction_count());
    Ok(use_map)
}

/// Sweep 2: collect the objects incident at each junction, plus node-typed
/// junction markers (mini roundabouts and the like), attached to the
/// junction sharing their quantized coordinate.
pub(crate) fn collect_junction_objects(
    config: &TypeConfig,
    parameter: &ImportParameter,
    use_map: &NodeUseMap,
    timer: &mut Timer,
) -> Result<Vec<Intersection>> {
    // BTreeMap so the result is ordered by id, independent of hash state.
    let mut junctions: BTreeMap<NodeId, Vec<ObjectFileRef>> = BTreeMap::new();

    let mut scanner = open_ways(parameter)?;
    let count = scanner.read_u32()?;
    timer.start_iter("collecting way objects at junctions", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let way = Way::read(&mut scanner)?;
        if !way_is_routable(config, &way) {
            continue;
        }
        for point in &way.nodes {
            if point.is_relevant() && use_map.is_junction(point.id()) {
                let objects = junctions.entry(point.id()).or_default();
                let object = ObjectFileRef::way(offset);
                if !objects.contains(&object) {
                    objects.push(object);
                }
            }
        }
    }
    scanner.close()?;

    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    timer.start_iter("collecting area objects at junctions", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let area = Area::read(&mut scanner)?;
        if !area_is_routable(config, &area) {
            continue;
        }
        for point in &area.rings[0].nodes {
            if point.is_relevant() && use_map.is_junction(point.id()) {
                let objects = junctions.entry(point.id()).or_default();
                let object = ObjectFileRef::area(offset);
                if !objects.contains(&object) {
                    objects.push(object);
                }
            }
        }
    }
    scanner.close()?;

    // Junction markers: match on the coordinate part of the id, any serial.
    let mut by_cell: HashMap<NodeId, NodeId> = HashMap::new();
    for id in junctions.keys() {
        by_cell.insert(id >> 8, *id);
    }

    let path = parameter.file(NODES_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, parameter.node_data_mmap)?;
    let count = scanner.read_u32()?;
    timer.start_iter("attaching junction markers", count as usize);
    let mut markers = 0;
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let node = Node::read(&mut scanner)?;
        if !config.get(node.type_id).junction_marker {
            continue;
        }
        if let Some(junction_id) = by_cell.get(&(Point::new(0, node.coord).id() >> 8)) {
            let objects = junctions.get_mut(junction_id).unwrap();
            let object = ObjectFileRef::node(offset);
            if !objects.contains(&object) {
                objects.push(object);
                markers += 1;
            }
        }
    }
    scanner.close()?;
    if markers > 0 {
        info!("Attached {} junction marker(s)", markers);
    }

    // Sort objects by increasing file offset, for more efficient storage in
    // the route node.
    let mut intersections: Vec<Intersection> = junctions
        .into_iter()
        .map(|(id, mut objects)| {
            objects.sort();
            Intersection { id, objects }
        })
        .collect();
    intersections.sort_by_key(|junction| junction.id);

    Ok(intersections)
}

pub fn write_intersections_file(
    parameter: &ImportParameter,
    intersections: &[Intersection],
) -> Result<()> {
    let path = parameter.file(INTERSECTIONS_DAT);
    let mut writer = FileWriter::create(&path)?;

    writer.write_u32(intersections.len() as u32)?;
    let mut refs = ObjectFileRefStreamWriter::new();
    for junction in intersections {
        writer.write_varint_u64(junction.id)?;
        writer.write_varint_u64(junction.objects.len() as u64)?;
        refs.reset();
        for object in &junction.objects {
            refs.write(&mut writer, *object)?;
        }
    }
    writer.close()?;
    Ok(())
}

pub fn read_intersections_file(parameter: &ImportParameter) -> Result<Vec<Intersection>> {
    let path = parameter.file(INTERSECTIONS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false)?;

    let count = scanner.read_u32()?;
    let mut refs = ObjectFileRefStreamReader::new();
    let mut intersections = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = scanner.read_varint_u64()?;
        let object_count = scanner.read_varint_u64()? as usize;
        refs.reset();
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            objects.push(refs.read(&mut scanner)?);
        }
        intersections.push(Intersection { id, objects });
    }
    scanner.close()?;
    Ok(intersections)
}
