//! Builds the route graph for a tiny synthetic network and checks the
//! emitted files end to end.

use geom::GeoCoord;
use map_data::{
    route_nodes_filename, AccessValue, ImportParameter, ObjectFileRef, Point, TurnRestriction,
    TurnRestrictionKind, TypeConfig, TypeInfo, Vehicle, Way, AREAS_DAT, COORDS_DAT, NODES_DAT,
    TURN_RESTRICTIONS_DAT, WAYS_DAT, WAY_ID_MAP,
};
use osmio::{FileOffset, FileWriter};
use osmutil::Timer;
use route_graph::{build_route_graph, read_intersections_file, RouteNodeFile};

const T_ROAD: u16 = 1;
const T_FOOTPATH: u16 = 2;

fn test_config() -> TypeConfig {
    let mut road = TypeInfo::new("highway_residential");
    road.default_access = AccessValue::bidirectional(true, true, true);
    road.max_speed = 50;

    let mut footpath = TypeInfo::new("highway_footway");
    footpath.default_access = AccessValue::bidirectional(true, false, false);

    TypeConfig::new(vec![TypeInfo::new("unknown"), road, footpath])
}

struct Network {
    _dir: tempfile::TempDir,
    parameter: ImportParameter,
    way_offsets: Vec<FileOffset>,
}

/// Writes the fixture files: the given ways, no nodes/areas, and the given
/// restrictions with their id maps.
fn build_network(ways: &[Way], osm_way_ids: &[u64], restrictions: &[TurnRestriction], via_points: &[(u64, Point)]) -> Network {
    let dir = tempfile::tempdir().unwrap();
    let parameter = ImportParameter::new(dir.path().display().to_string());

    let mut writer = FileWriter::create(&parameter.file(NODES_DAT)).unwrap();
    writer.write_u32(0).unwrap();
    writer.close().unwrap();

    let mut writer = FileWriter::create(&parameter.file(AREAS_DAT)).unwrap();
    writer.write_u32(0).unwrap();
    writer.close().unwrap();

    let mut way_offsets = Vec::new();
    let mut writer = FileWriter::create(&parameter.file(WAYS_DAT)).unwrap();
    writer.write_u32(ways.len() as u32).unwrap();
    for way in ways {
        way_offsets.push(writer.pos());
        way.write(&mut writer).unwrap();
    }
    writer.close().unwrap();

    let id_map: Vec<(u64, FileOffset)> = osm_way_ids
        .iter()
        .zip(&way_offsets)
        .map(|(id, offset)| (*id, *offset))
        .collect();
    let mut writer = FileWriter::create(&parameter.file(WAY_ID_MAP)).unwrap();
    map_data::write_way_id_map(&mut writer, &id_map).unwrap();
    writer.close().unwrap();

    let mut writer = FileWriter::create(&parameter.file(COORDS_DAT)).unwrap();
    map_data::write_coord_id_map(&mut writer, via_points).unwrap();
    writer.close().unwrap();

    let mut writer = FileWriter::create(&parameter.file(TURN_RESTRICTIONS_DAT)).unwrap();
    map_data::write_turn_restrictions(&mut writer, restrictions).unwrap();
    writer.close().unwrap();

    Network {
        _dir: dir,
        parameter,
        way_offsets,
    }
}

fn road(type_id: u16, points: &[Point]) -> Way {
    Way {
        type_id,
        name: None,
        address: None,
        access: None,
        restricted: None,
        max_speed: 0,
        grade: 1,
        nodes: points.to_vec(),
    }
}

/// A triangle of three two-way roads; every corner is a junction.
fn triangle() -> ([Point; 3], Vec<Way>) {
    let j1 = Point::new(1, GeoCoord::new(0.0, 0.0));
    let j2 = Point::new(2, GeoCoord::new(0.0, 0.01));
    let j3 = Point::new(3, GeoCoord::new(0.01, 0.0));
    let ways = vec![
        road(T_ROAD, &[j1, j2]),
        road(T_ROAD, &[j2, j3]),
        road(T_ROAD, &[j3, j1]),
    ];
    ([j1, j2, j3], ways)
}

#[test]
fn triangle_graph_is_symmetric() {
    let (corners, ways) = triangle();
    let network = build_network(&ways, &[101, 102, 103], &[], &[]);

    let mut timer = Timer::throwaway();
    build_route_graph(&test_config(), &network.parameter, None, &mut timer).unwrap();
    timer.done();

    let intersections = read_intersections_file(&network.parameter).unwrap();
    assert_eq!(intersections.len(), 3);
    for junction in &intersections {
        assert_eq!(junction.objects.len(), 2);
    }

    let path = network.parameter.file(&route_nodes_filename(Vehicle::Car));
    let mut file = RouteNodeFile::open(&path, false).unwrap();
    assert_eq!(file.node_count(), 3);

    // Every edge exists in both directions with the same distance.
    for corner in &corners {
        let node = file.node_by_id(corner.id()).unwrap().unwrap();
        assert_eq!(node.paths.len(), 2);
        for path in &node.paths {
            let back = file.node_by_id(path.target_id).unwrap().unwrap();
            let reverse = back
                .paths
                .iter()
                .find(|p| p.target_id == corner.id())
                .expect("reverse path missing");
            assert!((reverse.distance_m - path.distance_m).abs() < 1e-9);
        }
    }

    // Distances match the great-circle length of the underlying segment.
    let j1 = file.node_by_id(corners[0].id()).unwrap().unwrap();
    let to_j2 = j1
        .paths
        .iter()
        .find(|p| p.target_id == corners[1].id())
        .unwrap();
    let expected = corners[0].coord.distance_to(corners[1].coord);
    assert!((to_j2.distance_m - expected).abs() < 1e-9);
}

#[test]
fn foot_only_ways_drop_out_of_the_car_file() {
    let (corners, mut ways) = triangle();
    // The j3-j1 leg becomes a footpath.
    ways[2].type_id = T_FOOTPATH;
    let network = build_network(&ways, &[101, 102, 103], &[], &[]);

    let mut timer = Timer::throwaway();
    build_route_graph(&test_config(), &network.parameter, None, &mut timer).unwrap();
    timer.done();

    let path = network.parameter.file(&route_nodes_filename(Vehicle::Car));
    let mut car = RouteNodeFile::open(&path, false).unwrap();
    let j1 = car.node_by_id(corners[0].id()).unwrap().unwrap();
    assert_eq!(j1.paths.len(), 1);
    assert_eq!(j1.paths[0].target_id, corners[1].id());

    let path = network.parameter.file(&route_nodes_filename(Vehicle::Foot));
    let mut foot = RouteNodeFile::open(&path, false).unwrap();
    let j1 = foot.node_by_id(corners[0].id()).unwrap().unwrap();
    assert_eq!(j1.paths.len(), 2);
}

#[test]
fn forbid_restriction_becomes_an_exclude() {
    let (corners, ways) = triangle();
    let network = build_network(
        &ways,
        &[101, 102, 103],
        &[TurnRestriction {
            kind: TurnRestrictionKind::Forbid,
            from_way: 101,
            via_node: 202,
            to_way: 102,
        }],
        &[(202, corners[1])],
    );

    let mut timer = Timer::throwaway();
    build_route_graph(&test_config(), &network.parameter, None, &mut timer).unwrap();
    timer.done();

    let path = network.parameter.file(&route_nodes_filename(Vehicle::Car));
    let mut file = RouteNodeFile::open(&path, false).unwrap();
    let j2 = file.node_by_id(corners[1].id()).unwrap().unwrap();

    assert_eq!(j2.excludes.len(), 1);
    let exclude = &j2.excludes[0];
    assert_eq!(exclude.source, ObjectFileRef::way(network.way_offsets[0]));
    // The banned path leads onto the second way.
    assert_eq!(
        j2.object_of_path(exclude.target_index),
        ObjectFileRef::way(network.way_offsets[1])
    );

    // The other corners carry no excludes.
    let j1 = file.node_by_id(corners[0].id()).unwrap().unwrap();
    assert!(j1.excludes.is_empty());
}

#[test]
fn unresolvable_restrictions_are_dropped() {
    let (_, ways) = triangle();
    let network = build_network(
        &ways,
        &[101, 102, 103],
        &[TurnRestriction {
            kind: TurnRestrictionKind::Forbid,
            from_way: 999, // unknown way id
            via_node: 202,
            to_way: 102,
        }],
        &[],
    );

    let mut timer = Timer::throwaway();
    // Must not fail; the restriction is logged and skipped.
    build_route_graph(&test_config(), &network.parameter, None, &mut timer).unwrap();
    timer.done();
}
