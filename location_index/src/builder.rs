//! The offline pipeline assembling the region tree and attaching locations,
//! addresses and POIs to it. Phases run strictly in sequence, each streaming
//! one data file; only the growing tree is held in memory.

use anyhow::{Context, Result};
use geom::{coord_in_ring, ring_completely_in_ring, ring_partly_in_ring, GeoBox, GeoCoord};
use map_data::{
    Area, ImportParameter, Node, ObjectFileRef, TypeConfig, Way, AREAS_DAT, NODES_DAT, WAYS_DAT,
};
use osmio::{FileScanner, ScannerMode};
use osmutil::{Breaker, Cancelled, Timer};

use crate::grid::{region_at_mut, RegionGrid};
use crate::ignore_tokens::calculate_ignore_tokens;
use crate::region::{Region, RegionAddress, RegionAlias, RegionPoi};
use crate::writer::write_location_index;

/// A boundary area waiting to be sorted into the tree, bucketed by admin
/// level so coarse boundaries are inserted first.
struct Boundary {
    reference: ObjectFileRef,
    name: String,
    level: u8,
    areas: Vec<Vec<GeoCoord>>,
}

fn check_breaker(breaker: Option<&dyn Breaker>) -> Result<()> {
    if breaker.map_or(false, |b| b.is_aborted()) {
        return Err(Cancelled.into());
    }
    Ok(())
}

/// Runs the whole location index build and writes `location.idx` into the
/// destination directory. The breaker, if any, is polled between phases.
pub fn build_location_index(
    config: &TypeConfig,
    parameter: &ImportParameter,
    breaker: Option<&dyn Breaker>,
    timer: &mut Timer,
) -> Result<()> {
    let mut root = Region::root();

    timer.start("collect administrative boundaries");
    let boundaries = collect_boundaries(config, parameter, timer)?;
    timer.stop("collect administrative boundaries");
    info!("Found {} administrative boundaries", boundaries.len());

    check_breaker(breaker)?;
    timer.start("sort boundaries into region tree");
    for level in 1..=10 {
        for boundary in &boundaries {
            if boundary.level == level {
                root.add(Region::new(
                    boundary.name.clone(),
                    boundary.reference,
                    boundary.areas.clone(),
                ));
            }
        }
    }
    timer.stop("sort boundaries into region tree");

    check_breaker(breaker)?;
    timer.start("index place areas as regions");
    index_region_areas(config, parameter, &mut root, timer)?;
    timer.stop("index place areas as regions");

    info!(
        "Region tree depth {}, {} regions",
        root.depth(),
        root.region_count()
    );

    // From here on the tree structure is frozen; the grid stores child-index
    // paths into it, and later phases only append leaves.
    check_breaker(breaker)?;
    timer.start("build region grid index");
    let grid = RegionGrid::build(&root);
    timer.stop("build region grid index");

    check_breaker(breaker)?;
    timer.start("index place nodes as aliases");
    index_region_nodes(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index place nodes as aliases");

    check_breaker(breaker)?;
    timer.start("index location areas");
    index_location_areas(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index location areas");

    check_breaker(breaker)?;
    timer.start("index location ways");
    index_location_ways(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index location ways");

    check_breaker(breaker)?;
    timer.start("index address and POI areas");
    index_address_areas(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index address and POI areas");

    check_breaker(breaker)?;
    timer.start("index address and POI ways");
    index_address_ways(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index address and POI ways");

    check_breaker(breaker)?;
    timer.start("index address and POI nodes");
    index_address_nodes(config, parameter, &mut root, &grid, timer)?;
    timer.stop("index address and POI nodes");

    check_breaker(breaker)?;
    timer.start("calculate ignore tokens");
    let (region_tokens, location_tokens) = calculate_ignore_tokens(&root);
    timer.stop("calculate ignore tokens");
    info!(
        "{} region and {} location ignore token(s)",
        region_tokens.len(),
        location_tokens.len()
    );

    check_breaker(breaker)?;
    timer.start("write location index");
    write_location_index(parameter, &mut root, &region_tokens, &location_tokens)?;
    timer.stop("write location index");

    Ok(())
}

fn open_areas(parameter: &ImportParameter) -> Result<FileScanner> {
    let path = parameter.file(AREAS_DAT);
    FileScanner::open(&path, ScannerMode::Sequential, parameter.area_data_mmap)
        .with_context(|| format!("opening {}", path))
}

fn collect_boundaries(
    config: &TypeConfig,
    parameter: &ImportParameter,
    timer: &mut Timer,
) -> Result<Vec<Boundary>> {
    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    let mut boundaries = Vec::new();

    timer.start_iter("scanning areas for boundaries", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let area = Area::read(&mut scanner)?;
        if !config.get(area.type_id).boundary {
            continue;
        }

        let first_ring = match area.outer_rings().next() {
            Some(ring) => ring,
            None => continue,
        };
        let name = match &first_ring.name {
            Some(name) => name.clone(),
            None => {
                warn!("Boundary area {} has no name, skipping", offset);
                continue;
            }
        };
        let level = match first_ring.admin_level {
            Some(level) if (1..=10).contains(&level) => level,
            _ => {
                info!("Boundary area '{}' ({}) has no admin level", name, offset);
                continue;
            }
        };

        boundaries.push(Boundary {
            reference: ObjectFileRef::area(offset),
            name,
            level,
            areas: area.outer_rings().map(|r| r.coords()).collect(),
        });
    }
    scanner.close()?;

    Ok(boundaries)
}

fn index_region_areas(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    timer: &mut Timer,
) -> Result<()> {
    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    let mut found = 0;

    timer.start_iter("scanning areas for places", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let area = Area::read(&mut scanner)?;
        let info = config.get(area.type_id);
        if info.ignore || !info.index_as_region {
            continue;
        }
        let name = match area.outer_rings().find_map(|r| r.name.clone()) {
            Some(name) => name,
            None => {
                warn!("Place area {} has no name, skipping", offset);
                continue;
            }
        };

        root.add(Region::new(
            name,
            ObjectFileRef::area(offset),
            area.outer_rings().map(|r| r.coords()).collect(),
        ));
        found += 1;
    }
    scanner.close()?;

    info!("Found {} regions of type 'area'", found);
    Ok(())
}

/// Descend to the deepest region whose ring contains the node, then attach
/// the alias there, unless the region already carries that very name.
fn add_alias_to_region(region: &mut Region, alias: RegionAlias, coord: GeoCoord) {
    for child in &mut region.regions {
        if child.areas.iter().any(|ring| coord_in_ring(coord, ring)) {
            return add_alias_to_region(child, alias, coord);
        }
    }

    if region.name == alias.name {
        return;
    }
    region.aliases.push(alias);
}

fn index_region_nodes(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let path = parameter.file(NODES_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, parameter.node_data_mmap)?;
    let count = scanner.read_u32()?;
    let mut found = 0;

    timer.start_iter("scanning nodes for places", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let node = Node::read(&mut scanner)?;
        let info = config.get(node.type_id);
        if info.ignore || !info.index_as_region {
            continue;
        }
        let name = match &node.name {
            Some(name) => name.clone(),
            None => {
                warn!("Place node {} has no name, skipping", offset);
                continue;
            }
        };

        let region_path = grid.region_for_coord(root, node.coord);
        let region = region_at_mut(root, &region_path);
        add_alias_to_region(
            region,
            RegionAlias {
                name,
                node_offset: offset,
            },
            node.coord,
        );
        found += 1;
    }
    scanner.close()?;

    info!("Found {} place nodes", found);
    Ok(())
}

/// Registers the object at every region from the deepest partially
/// containing one upward, stopping at (and including) the first region that
/// completely contains it. Returns whether this subtree completely contained
/// the object.
///
/// Designed to minimize point-in-ring tests: descending on areas checks only
/// the first vertex, banking on locality; the full containment test runs
/// once per visited level.
fn add_location_object(
    region: &mut Region,
    object: ObjectFileRef,
    nodes: &[GeoCoord],
    name: &str,
    bounds: &GeoBox,
    descend_on_first_vertex: bool,
) -> bool {
    for child in &mut region.regions {
        if !child.bounds.overlaps(bounds) {
            continue;
        }
        let matches = if descend_on_first_vertex {
            child.areas.iter().any(|ring| coord_in_ring(nodes[0], ring))
        } else {
            child
                .areas
                .iter()
                .any(|ring| ring_partly_in_ring(nodes, ring))
        };
        if matches
            && add_location_object(child, object, nodes, name, bounds, descend_on_first_vertex)
        {
            return true;
        }
    }

    region
        .locations
        .entry(name.to_string())
        .or_default()
        .objects
        .push(object);

    region
        .areas
        .iter()
        .any(|ring| ring_completely_in_ring(nodes, ring))
}

fn index_location_areas(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    let mut found = 0;

    timer.start_iter("scanning areas for locations", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let area = Area::read(&mut scanner)?;

        for ring in area.outer_rings() {
            let info = config.get(ring.type_id);
            if info.ignore || !info.index_as_location {
                continue;
            }
            let name = match &ring.name {
                Some(name) => name,
                None => continue,
            };

            let nodes = ring.coords();
            let bounds = GeoBox::from_ring(&nodes);
            let region_path = grid.region_for_coord(root, bounds.min_coord());
            let region = region_at_mut(root, &region_path);
            add_location_object(region, ObjectFileRef::area(offset), &nodes, name, &bounds, true);
            found += 1;
        }
    }
    scanner.close()?;

    info!("Found {} locations of type 'area'", found);
    Ok(())
}

fn index_location_ways(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let path = parameter.file(WAYS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, parameter.way_data_mmap)?;
    let count = scanner.read_u32()?;
    let mut found = 0;

    timer.start_iter("scanning ways for locations", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let way = Way::read(&mut scanner)?;
        let info = config.get(way.type_id);
        if info.ignore || !info.index_as_location {
            continue;
        }
        let name = match &way.name {
            Some(name) => name.clone(),
            None => continue,
        };

        let nodes: Vec<GeoCoord> = way.nodes.iter().map(|p| p.coord).collect();
        let bounds = GeoBox::from_ring(&nodes);
        let region_path = grid.region_for_coord(root, bounds.min_coord());
        let region = region_at_mut(root, &region_path);
        add_location_object(region, ObjectFileRef::way(offset), &nodes, &name, &bounds, false);
        found += 1;
    }
    scanner.close()?;

    info!("Found {} locations of type 'way'", found);
    Ok(())
}

/// Walk down through children that completely contain the object, then look
/// the street up in the final region. Unknown streets are dirty data: logged
/// and dropped. Duplicate house numbers keep the first write.
fn add_address_to_region(
    region: &mut Region,
    object: ObjectFileRef,
    street: &str,
    house_number: &str,
    nodes: &[GeoCoord],
    bounds: &GeoBox,
) {
    for child in &mut region.regions {
        if !child.bounds.overlaps(bounds) {
            continue;
        }
        if child
            .areas
            .iter()
            .any(|ring| ring_completely_in_ring(nodes, ring))
        {
            return add_address_to_region(child, object, street, house_number, nodes, bounds);
        }
    }

    match region.locations.get_mut(street) {
        Some(location) => {
            if location
                .addresses
                .iter()
                .any(|a| a.house_number == house_number)
            {
                return;
            }
            location.addresses.push(RegionAddress {
                house_number: house_number.to_string(),
                object,
            });
        }
        None => {
            debug!(
                "Street '{}' of address '{}' ({}) cannot be resolved in region '{}'",
                street, house_number, object, region.name
            );
        }
    }
}

fn add_poi_to_region(
    region: &mut Region,
    name: &str,
    object: ObjectFileRef,
    nodes: &[GeoCoord],
    bounds: &GeoBox,
) {
    for child in &mut region.regions {
        if !child.bounds.overlaps(bounds) {
            continue;
        }
        if child
            .areas
            .iter()
            .any(|ring| ring_completely_in_ring(nodes, ring))
        {
            return add_poi_to_region(child, name, object, nodes, bounds);
        }
    }

    region.pois.push(RegionPoi {
        name: name.to_string(),
        object,
    });
}

fn index_address_areas(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let mut scanner = open_areas(parameter)?;
    let count = scanner.read_u32()?;
    let mut addresses = 0;
    let mut pois = 0;

    timer.start_iter("scanning areas for addresses", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let area = Area::read(&mut scanner)?;

        for ring in area.outer_rings() {
            let info = config.get(ring.type_id);
            if info.ignore {
                continue;
            }
            let is_poi = info.index_as_poi && ring.name.is_some();
            if ring.address.is_none() && !is_poi {
                continue;
            }

            let nodes = ring.coords();
            let bounds = GeoBox::from_ring(&nodes);
            let region_path = grid.region_for_coord(root, nodes[0]);

            if let Some((street, number)) = &ring.address {
                let region = region_at_mut(root, &region_path);
                add_address_to_region(
                    region,
                    ObjectFileRef::area(offset),
                    street,
                    number,
                    &nodes,
                    &bounds,
                );
                addresses += 1;
            }
            if is_poi {
                let region = region_at_mut(root, &region_path);
                add_poi_to_region(
                    region,
                    ring.name.as_ref().unwrap(),
                    ObjectFileRef::area(offset),
                    &nodes,
                    &bounds,
                );
                pois += 1;
            }
        }
    }
    scanner.close()?;

    info!("Found {} address and {} POI areas", addresses, pois);
    Ok(())
}

fn index_address_ways(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let path = parameter.file(WAYS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, parameter.way_data_mmap)?;
    let count = scanner.read_u32()?;
    let mut addresses = 0;
    let mut pois = 0;

    timer.start_iter("scanning ways for addresses", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let way = Way::read(&mut scanner)?;
        let info = config.get(way.type_id);
        if info.ignore {
            continue;
        }
        let is_poi = info.index_as_poi && way.name.is_some();
        if way.address.is_none() && !is_poi {
            continue;
        }

        let nodes: Vec<GeoCoord> = way.nodes.iter().map(|p| p.coord).collect();
        let bounds = GeoBox::from_ring(&nodes);
        let region_path = grid.region_for_coord(root, nodes[0]);

        if let Some((street, number)) = &way.address {
            let region = region_at_mut(root, &region_path);
            add_address_to_region(region, ObjectFileRef::way(offset), street, number, &nodes, &bounds);
            addresses += 1;
        }
        if is_poi {
            let region = region_at_mut(root, &region_path);
            add_poi_to_region(
                region,
                way.name.as_ref().unwrap(),
                ObjectFileRef::way(offset),
                &nodes,
                &bounds,
            );
            pois += 1;
        }
    }
    scanner.close()?;

    info!("Found {} address and {} POI ways", addresses, pois);
    Ok(())
}

fn index_address_nodes(
    config: &TypeConfig,
    parameter: &ImportParameter,
    root: &mut Region,
    grid: &RegionGrid,
    timer: &mut Timer,
) -> Result<()> {
    let path = parameter.file(NODES_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, parameter.node_data_mmap)?;
    let count = scanner.read_u32()?;
    let mut addresses = 0;
    let mut pois = 0;

    timer.start_iter("scanning nodes for addresses", count as usize);
    for _ in 0..count {
        timer.next();
        let offset = scanner.pos()?;
        let node = Node::read(&mut scanner)?;
        let info = config.get(node.type_id);
        if info.ignore {
            continue;
        }
        let is_poi = info.index_as_poi && node.name.is_some();
        if node.address.is_none() && !is_poi {
            continue;
        }

        // The grid already answers with the deepest containing region; a
        // point needs no further descent.
        let region_path = grid.region_for_coord(root, node.coord);
        let region = region_at_mut(root, &region_path);

        if let Some((street, number)) = &node.address {
            match region.locations.get_mut(street) {
                Some(location) => {
                    if !location.addresses.iter().any(|a| a.house_number == *number) {
                        location.addresses.push(RegionAddress {
                            house_number: number.clone(),
                            object: ObjectFileRef::node(offset),
                        });
                        addresses += 1;
                    }
                }
                None => {
                    debug!(
                        "Street '{}' of address node {} cannot be resolved in region '{}'",
                        street, offset, region.name
                    );
                }
            }
        }
        if is_poi {
            region.pois.push(RegionPoi {
                name: node.name.clone().unwrap(),
                object: ObjectFileRef::node(offset),
            });
            pois += 1;
        }
    }
    scanner.close()?;

    info!("Found {} address and {} POI nodes", addresses, pois);
    Ok(())
}
