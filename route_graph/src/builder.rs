//! The route graph build pipeline: resolve restrictions, discover junctions,
//! then emit one tiled route-node file (plus its object-variant sidecar) per
//! requested vehicle.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result};
use map_data::{
    coord_from_id, route_nodes_filename, AccessValue, Area, ImportParameter, NodeId,
    ObjectFileRef, Point, RefType, TypeConfig, Vehicle, Way, AREAS_DAT, WAYS_DAT,
};
use osmio::{FileOffset, FileScanner, FileWriter, ScannerMode};
use osmutil::{Breaker, Cancelled, Timer};
use scoped_threadpool::Pool;

use crate::discovery::{collect_junction_objects, find_junction_ids, write_intersections_file};
use crate::edges::{
    calculate_area_paths, calculate_circular_way_paths, calculate_way_paths,
    fill_route_path_excludes,
};
use crate::restrictions::{resolve_turn_restrictions, ViaTurnRestrictions};
use crate::route_node::{write_object_variants, ObjectVariant, RouteNode};
use crate::tiles::{tile_of, Tile};

/// Ways without an explicit access value inherit their type's default.
pub(crate) fn access_of(config: &TypeConfig, way: &Way) -> AccessValue {
    way.access
        .unwrap_or_else(|| config.get(way.type_id).default_access)
}

struct RawRouteNode {
    id: NodeId,
    cell: Tile,
    objects: Vec<ObjectFileRef>,
}

fn check_breaker(breaker: Option<&dyn Breaker>) -> Result<()> {
    if breaker.map_or(false, |b| b.is_aborted()) {
        return Err(Cancelled.into());
    }
    Ok(())
}

/// Runs the whole route graph build: `intersections.dat` plus, per vehicle,
/// `router_<vehicle>.dat` and `router_<vehicle>.variants.dat`. The breaker,
/// if any, is polled between phases.
pub fn build_route_graph(
    config: &TypeConfig,
    parameter: &ImportParameter,
    breaker: Option<&dyn Breaker>,
    timer: &mut Timer,
) -> Result<()> {
    timer.start("resolve turn restrictions");
    let restrictions = resolve_turn_restrictions(parameter, timer)?;
    timer.stop("resolve turn restrictions");
    info!("Restrictions act at {} junction(s)", restrictions.len());

    check_breaker(breaker)?;
    timer.start("find junctions");
    let use_map = find_junction_ids(config, parameter, timer)?;
    timer.stop("find junctions");

    check_breaker(breaker)?;
    timer.start("collect objects at junctions");
    let intersections = collect_junction_objects(config, parameter, &use_map, timer)?;
    timer.stop("collect objects at junctions");

    check_breaker(breaker)?;
    timer.start("write intersections file");
    write_intersections_file(parameter, &intersections)?;
    timer.stop("write intersections file");

    // The tile of a node comes from the coordinate encoded in its id, so the
    // query side can find it again with nothing but the id.
    let mag = parameter.route_node_tile_mag;
    let mut raw_nodes: Vec<RawRouteNode> = intersections
        .into_iter()
        .map(|junction| RawRouteNode {
            id: junction.id,
            cell: tile_of(coord_from_id(junction.id), mag),
            objects: junction.objects,
        })
        .collect();
    raw_nodes.sort_by_key(|node| (node.cell.1, node.cell.0, node.id));

    let junction_ids: BTreeSet<NodeId> = raw_nodes.iter().map(|node| node.id).collect();

    for vehicle in &parameter.vehicles {
        check_breaker(breaker)?;
        timer.start(format!("write route graph for {}", vehicle));
        write_route_graph(
            config,
            parameter,
            &raw_nodes,
            &junction_ids,
            &restrictions,
            *vehicle,
            timer,
        )?;
        timer.stop(format!("write route graph for {}", vehicle));
    }

    Ok(())
}

fn load_ways(
    parameter: &ImportParameter,
    offsets: &BTreeSet<FileOffset>,
) -> Result<HashMap<FileOffset, Way>> {
    let path = parameter.file(WAYS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Random, parameter.way_data_mmap)
        .with_context(|| format!("opening {}", path))?;
    let mut map = HashMap::with_capacity(offsets.len());
    for offset in offsets {
        scanner.seek(*offset)?;
        map.insert(*offset, Way::read(&mut scanner)?);
    }
    scanner.close()?;
    Ok(map)
}

fn load_areas(
    parameter: &ImportParameter,
    offsets: &BTreeSet<FileOffset>,
) -> Result<HashMap<FileOffset, Area>> {
    let path = parameter.file(AREAS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Random, parameter.area_data_mmap)
        .with_context(|| format!("opening {}", path))?;
    let mut map = HashMap::with_capacity(offsets.len());
    for offset in offsets {
        scanner.seek(*offset)?;
        map.insert(*offset, Area::read(&mut scanner)?);
    }
    scanner.close()?;
    Ok(map)
}

fn is_any_routable(
    config: &TypeConfig,
    raw: &RawRouteNode,
    ways: &HashMap<FileOffset, Way>,
    areas: &HashMap<FileOffset, Area>,
    vehicle: Vehicle,
) -> bool {
    raw.objects.iter().any(|object| match object.typ {
        RefType::Way => ways
            .get(&object.offset)
            .map(|way| access_of(config, way).can_route(vehicle))
            .unwrap_or(false),
        RefType::Area => areas
            .get(&object.offset)
            .map(|area| config.get(area.type_id).can_route())
            .unwrap_or(false),
        RefType::Node => false,
    })
}

/// The precise point of the junction, recovered from any object that holds
/// it.
fn route_node_point(
    raw: &RawRouteNode,
    ways: &HashMap<FileOffset, Way>,
    areas: &HashMap<FileOffset, Area>,
) -> Option<Point> {
    for object in &raw.objects {
        match object.typ {
            RefType::Way => {
                if let Some(way) = ways.get(&object.offset) {
                    if let Some(idx) = way.node_index_by_id(raw.id) {
                        return Some(way.nodes[idx]);
                    }
                }
            }
            RefType::Area => {
                if let Some(area) = areas.get(&object.offset) {
                    if let Some(idx) = area.rings[0].node_index_by_id(raw.id) {
                        return Some(area.rings[0].nodes[idx]);
                    }
                }
            }
            RefType::Node => {}
        }
    }
    None
}

fn intern_variant(variants: &mut BTreeMap<ObjectVariant, u16>, variant: ObjectVariant) -> u16 {
    if let Some(index) = variants.get(&variant) {
        return *index;
    }
    let index = variants.len() as u16;
    variants.insert(variant, index);
    index
}

fn write_route_graph(
    config: &TypeConfig,
    parameter: &ImportParameter,
    raw_nodes: &[RawRouteNode],
    junction_ids: &BTreeSet<NodeId>,
    restrictions: &ViaTurnRestrictions,
    vehicle: Vehicle,
    timer: &mut Timer,
) -> Result<()> {
    let data_path = parameter.file(&route_nodes_filename(vehicle));
    let mut writer = FileWriter::create(&data_path)?;

    match write_route_nodes(
        &mut writer,
        config,
        parameter,
        raw_nodes,
        junction_ids,
        restrictions,
        vehicle,
        timer,
    ) {
        Ok(variants) => {
            writer.close()?;
            write_object_variants(parameter, vehicle, &variants)?;
            Ok(())
        }
        Err(err) => {
            writer.close_failsafe();
            Err(err)
        }
    }
}

fn write_route_nodes(
    writer: &mut FileWriter,
    config: &TypeConfig,
    parameter: &ImportParameter,
    raw_nodes: &[RawRouteNode],
    junction_ids: &BTreeSet<NodeId>,
    restrictions: &ViaTurnRestrictions,
    vehicle: Vehicle,
    timer: &mut Timer,
) -> Result<Vec<ObjectVariant>> {
    let index_offset_patch = writer.reserve_file_offset()?;
    let node_count_patch = writer.reserve_u32()?;
    writer.write_u8(parameter.route_node_tile_mag)?;

    let mut variants: BTreeMap<ObjectVariant, u16> = BTreeMap::new();
    let mut tile_index: Vec<(Tile, FileOffset, u32)> = Vec::new();
    let mut written_count: u32 = 0;
    let mut simple_count: usize = 0;
    let mut path_count: usize = 0;
    let mut exclude_count: usize = 0;

    let mut pool = Pool::new(2);
    let block_size = parameter.route_node_block_size.max(1);

    for block in raw_nodes.chunks(block_size) {
        let way_offsets: BTreeSet<FileOffset> = block
            .iter()
            .flat_map(|node| node.objects.iter())
            .filter(|object| object.typ == RefType::Way)
            .map(|object| object.offset)
            .collect();
        let area_offsets: BTreeSet<FileOffset> = block
            .iter()
            .flat_map(|node| node.objects.iter())
            .filter(|object| object.typ == RefType::Area)
            .map(|object| object.offset)
            .collect();

        // Fork-join: both loads run on their own scanners; the writer blocks
        // on the pool before touching either map.
        let mut ways_result: Result<HashMap<FileOffset, Way>> = Ok(HashMap::new());
        let mut areas_result: Result<HashMap<FileOffset, Area>> = Ok(HashMap::new());
        pool.scoped(|scope| {
            scope.execute(|| {
                ways_result = load_ways(parameter, &way_offsets);
            });
            scope.execute(|| {
                areas_result = load_areas(parameter, &area_offsets);
            });
        });
        let ways_map = ways_result?;
        let areas_map = areas_result?;

        timer.start_iter(format!("writing {} route nodes", vehicle), block.len());
        for raw in block {
            timer.next();

            // If nothing at this junction is usable by the vehicle, the node
            // drops out of this file entirely.
            if !is_any_routable(config, raw, &ways_map, &areas_map, vehicle) {
                continue;
            }

            let point = match route_node_point(raw, &ways_map, &areas_map) {
                Some(point) => point,
                None => {
                    warn!("No object at junction {} holds its point", raw.id);
                    continue;
                }
            };

            let mut route_node = RouteNode::new(raw.id, point.coord);

            for object in &raw.objects {
                match object.typ {
                    RefType::Way => {
                        let way = match ways_map.get(&object.offset) {
                            Some(way) => way,
                            None => {
                                error!("Way at offset {} vanished from the block map", object.offset);
                                continue;
                            }
                        };
                        let access = access_of(config, way);
                        if !access.can_route(vehicle) {
                            continue;
                        }
                        let variant = intern_variant(
                            &mut variants,
                            ObjectVariant {
                                type_id: way.type_id,
                                max_speed: way.max_speed,
                                grade: way.grade,
                            },
                        );
                        if way.is_circular() {
                            calculate_circular_way_paths(
                                &mut route_node,
                                way,
                                *object,
                                variant,
                                access,
                                junction_ids,
                            );
                        } else {
                            calculate_way_paths(
                                &mut route_node,
                                way,
                                *object,
                                variant,
                                access,
                                junction_ids,
                            );
                        }
                    }
                    RefType::Area => {
                        let area = match areas_map.get(&object.offset) {
                            Some(area) => area,
                            None => {
                                error!("Area at offset {} vanished from the block map", object.offset);
                                continue;
                            }
                        };
                        if !config.get(area.type_id).can_route() {
                            continue;
                        }
                        let variant = intern_variant(
                            &mut variants,
                            ObjectVariant {
                                type_id: area.type_id,
                                max_speed: 0,
                                grade: 1,
                            },
                        );
                        route_node.add_object(*object, variant);
                        calculate_area_paths(
                            &mut route_node,
                            config,
                            area,
                            *object,
                            variant,
                            junction_ids,
                        );
                    }
                    RefType::Node => {}
                }
            }

            fill_route_path_excludes(&mut route_node, &raw.objects, restrictions);

            if route_node.paths.len() == 1 {
                simple_count += 1;
            }
            path_count += route_node.paths.len();
            exclude_count += route_node.excludes.len();

            match tile_index.last_mut() {
                Some((tile, _, count)) if *tile == raw.cell => *count += 1,
                _ => tile_index.push((raw.cell, writer.pos(), 1)),
            }
            route_node.write(writer)?;
            written_count += 1;
        }
    }

    let index_offset = writer.pos();
    writer.patch_file_offset(index_offset_patch, index_offset)?;
    writer.patch_u32(node_count_patch, written_count)?;

    writer.write_u32(tile_index.len() as u32)?;
    for ((x, y), offset, count) in &tile_index {
        writer.write_u32(*x)?;
        writer.write_u32(*y)?;
        writer.write_u64(*offset)?;
        writer.write_u32(*count)?;
    }

    info!(
        "{}: {} route node(s), {} simple, {} path(s), {} exclude(s), {} tile(s), {} variant(s)",
        vehicle,
        written_count,
        simple_count,
        path_count,
        exclude_count,
        tile_index.len(),
        variants.len()
    );

    let mut ordered: Vec<(u16, ObjectVariant)> =
        variants.into_iter().map(|(v, i)| (i, v)).collect();
    ordered.sort_by_key(|(i, _)| *i);
    Ok(ordered.into_iter().map(|(_, v)| v).collect())
}
