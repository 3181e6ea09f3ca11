//! End-to-end routing over tiny synthetic networks: build the graph files,
//! open them, and drive `calculate_route` through the interesting cases.

use geom::GeoCoord;
use map_data::{
    AccessValue, ImportParameter, ObjectFileRef, Point, RestrictedValue, TurnRestriction,
    TurnRestrictionKind, TypeConfig, TypeInfo, Vehicle, Way, AREAS_DAT, NODES_DAT,
    TURN_RESTRICTIONS_DAT, WAYS_DAT, WAY_ID_MAP, COORDS_DAT,
};
use osmio::{FileOffset, FileWriter};
use osmutil::Timer;
use route_graph::build_route_graph;
use routing::{
    Breaker, RoutePosition, RoutingDatabase, RoutingParameter, RoutingProfile, RoutingService,
    StepKind, Termination, ThreadedBreaker,
};

const T_ROAD: u16 = 1;

fn test_config() -> TypeConfig {
    let mut road = TypeInfo::new("highway_residential");
    road.default_access = AccessValue::bidirectional(true, true, true);
    road.max_speed = 50;
    TypeConfig::new(vec![TypeInfo::new("unknown"), road])
}

fn road(points: &[Point]) -> Way {
    Way {
        type_id: T_ROAD,
        name: None,
        address: None,
        access: None,
        restricted: None,
        max_speed: 0,
        grade: 1,
        nodes: points.to_vec(),
    }
}

struct TestMap {
    _dir: tempfile::TempDir,
    parameter: ImportParameter,
    way_offsets: Vec<FileOffset>,
}

impl TestMap {
    fn build(
        ways: &[Way],
        osm_way_ids: &[u64],
        restrictions: &[TurnRestriction],
        via_points: &[(u64, Point)],
    ) -> TestMap {
        let dir = tempfile::tempdir().unwrap();
        let parameter = ImportParameter::new(dir.path().display().to_string());

        for empty in [NODES_DAT, AREAS_DAT] {
            let mut writer = FileWriter::create(&parameter.file(empty)).unwrap();
            writer.write_u32(0).unwrap();
            writer.close().unwrap();
        }

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

        let mut timer = Timer::throwaway();
        build_route_graph(&test_config(), &parameter, None, &mut timer).unwrap();
        timer.done();

        TestMap {
            _dir: dir,
            parameter,
            way_offsets,
        }
    }

    fn service(&self, vehicle: Vehicle) -> RoutingService {
        let config = test_config();
        let database =
            RoutingDatabase::open(&self.parameter.destination_directory, vehicle, config.clone())
                .unwrap();
        RoutingService::new(database, RoutingProfile::fastest_path(vehicle, &config))
    }

    fn way_ref(&self, index: usize) -> ObjectFileRef {
        ObjectFileRef::way(self.way_offsets[index])
    }
}

fn pt(serial: u8, lat: f64, lon: f64) -> Point {
    Point::new(serial, GeoCoord::new(lat, lon))
}

/// A - B - C as two ways meeting at the junction B.
fn simple_chain() -> ([Point; 3], Vec<Way>) {
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0, 0.001);
    let c = pt(3, 0.0, 0.002);
    ([a, b, c], vec![road(&[a, b]), road(&[b, c])])
}

#[test]
fn simple_route_is_found_with_correct_length() {
    let ([a, b, c], ways) = simple_chain();
    let map = TestMap::build(&ways, &[101, 102], &[], &[]);
    let mut service = map.service(Vehicle::Foot);

    let result = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(1), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();

    assert_eq!(result.termination, Termination::Found);
    let route = result.route.unwrap();

    let points = service.route_to_points(&route).unwrap();
    let ids: Vec<u64> = points.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![a.id(), b.id(), c.id()]);

    let description = service.route_to_description(&route).unwrap();
    let expected = a.coord.distance_to(b.coord) + b.coord.distance_to(c.coord);
    assert!((description.total_distance() - expected).abs() < 1e-6);
    assert_eq!(description.steps.first().unwrap().kind, StepKind::Start);
    assert_eq!(description.steps.last().unwrap().kind, StepKind::Target);

    let way = service.route_to_way(&route).unwrap();
    assert_eq!(way.nodes.len(), 3);
}

#[test]
fn astar_prefers_the_cheaper_path() {
    // Direct way from A to C takes a long detour through X; going via B is
    // shorter. The route must pick B, not X.
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0005, 0.0005);
    let c = pt(3, 0.0, 0.001);
    let x = pt(4, 0.01, 0.0005);

    let ways = vec![road(&[a, x, c]), road(&[a, b]), road(&[b, c])];
    let map = TestMap::build(&ways, &[101, 102, 103], &[], &[]);
    let mut service = map.service(Vehicle::Car);

    let result = service
        .calculate_route(
            RoutePosition::new(map.way_ref(1), 0, 0),
            RoutePosition::new(map.way_ref(2), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();

    let route = result.route.unwrap();
    let points = service.route_to_points(&route).unwrap();
    let ids: Vec<u64> = points.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
    assert!(!ids.contains(&x.id()));
}

#[test]
fn forbidden_turn_is_never_taken() {
    // A-B, B-C, C-D; turning from the first onto the second way at B is
    // forbidden, and there is no detour.
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0, 0.001);
    let c = pt(3, 0.0, 0.002);
    let d = pt(4, 0.0, 0.003);

    let ways = vec![road(&[a, b]), road(&[b, c]), road(&[c, d])];
    let restriction = TurnRestriction {
        kind: TurnRestrictionKind::Forbid,
        from_way: 101,
        via_node: 202,
        to_way: 102,
    };
    let map = TestMap::build(&ways, &[101, 102, 103], &[restriction], &[(202, b)]);
    let mut service = map.service(Vehicle::Car);

    let result = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(2), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();

    assert_eq!(result.termination, Termination::NoRouteFound);
    assert!(result.route.is_none());
}

#[test]
fn forbidden_turn_takes_the_detour() {
    // Same ban, but a parallel way B-M-C exists; the route must detour
    // through M.
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0, 0.001);
    let c = pt(3, 0.0, 0.002);
    let d = pt(4, 0.0, 0.003);
    let m = pt(5, 0.0005, 0.0015);

    let ways = vec![
        road(&[a, b]),
        road(&[b, c]),
        road(&[c, d]),
        road(&[b, m, c]),
    ];
    let restriction = TurnRestriction {
        kind: TurnRestrictionKind::Forbid,
        from_way: 101,
        via_node: 202,
        to_way: 102,
    };
    let map = TestMap::build(&ways, &[101, 102, 103, 104], &[restriction], &[(202, b)]);
    let mut service = map.service(Vehicle::Car);

    let result = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(2), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();

    assert_eq!(result.termination, Termination::Found);
    let points = service.route_to_points(&result.route.unwrap()).unwrap();
    let ids: Vec<u64> = points.iter().map(|p| p.id()).collect();
    assert!(ids.contains(&m.id()), "route must detour through M: {:?}", ids);
}

#[test]
fn destination_only_zone_cannot_be_passed_through() {
    // A-B, B-C (destination only for cars), C-D, D-E. Driving A to E would
    // pass through the restricted zone: refused. Driving A to a target
    // inside the zone is fine.
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0, 0.001);
    let c = pt(3, 0.0, 0.002);
    let d = pt(4, 0.0, 0.003);
    let e = pt(5, 0.0, 0.004);

    let mut restricted = road(&[b, c]);
    restricted.restricted = Some(RestrictedValue {
        foot: false,
        bicycle: false,
        car: true,
    });

    let ways = vec![
        road(&[a, b]),
        restricted,
        road(&[c, d]),
        road(&[d, e]),
    ];
    let map = TestMap::build(&ways, &[101, 102, 103, 104], &[], &[]);
    let mut service = map.service(Vehicle::Car);

    let through = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(3), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();
    assert_eq!(through.termination, Termination::NoRouteFound);

    let into = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(1), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();
    assert_eq!(into.termination, Termination::Found);
}

#[test]
fn tripped_breaker_cancels() {
    let ([_, _, _], ways) = simple_chain();
    let map = TestMap::build(&ways, &[101, 102], &[], &[]);
    let mut service = map.service(Vehicle::Foot);

    let breaker = ThreadedBreaker::new();
    breaker.abort();
    assert!(breaker.is_aborted());

    let mut parameter = RoutingParameter {
        breaker: Some(&breaker),
        ..RoutingParameter::default()
    };
    let result = service
        .calculate_route(
            RoutePosition::new(map.way_ref(0), 0, 0),
            RoutePosition::new(map.way_ref(1), 1, 0),
            &mut parameter,
        )
        .unwrap();

    assert_eq!(result.termination, Termination::Cancelled);
    assert!(result.route.is_none());
}

#[test]
fn non_way_positions_are_bad_input() {
    let ([_, _, _], ways) = simple_chain();
    let map = TestMap::build(&ways, &[101, 102], &[], &[]);
    let mut service = map.service(Vehicle::Foot);

    let result = service
        .calculate_route(
            RoutePosition::new(ObjectFileRef::node(0), 0, 0),
            RoutePosition::new(map.way_ref(1), 1, 0),
            &mut RoutingParameter::default(),
        )
        .unwrap();
    assert!(matches!(result.termination, Termination::BadInput { .. }));
}

#[test]
fn route_crosses_databases_at_twin_nodes() {
    // Two databases joined at the shared junction C: a triangle A-B-C in
    // the first, a triangle C-D-E in the second.
    let a = pt(1, 0.0, 0.0);
    let b = pt(2, 0.0, 0.001);
    let c = pt(3, 0.0, 0.002);
    let d = pt(4, 0.0, 0.003);
    let e = pt(5, 0.0, 0.004);

    let first = TestMap::build(
        &[road(&[a, b]), road(&[b, c]), road(&[c, a])],
        &[101, 102, 103],
        &[],
        &[],
    );
    let second = TestMap::build(
        &[road(&[c, d]), road(&[d, e]), road(&[e, c])],
        &[201, 202, 203],
        &[],
        &[],
    );

    let config = test_config();
    let databases = vec![
        RoutingDatabase::open(
            &first.parameter.destination_directory,
            Vehicle::Car,
            config.clone(),
        )
        .unwrap(),
        RoutingDatabase::open(
            &second.parameter.destination_directory,
            Vehicle::Car,
            config.clone(),
        )
        .unwrap(),
    ];
    let profiles = vec![
        RoutingProfile::fastest_path(Vehicle::Car, &config),
        RoutingProfile::fastest_path(Vehicle::Car, &config),
    ];
    let mut service = RoutingService::with_databases(databases, profiles).unwrap();

    let result = service
        .calculate_route(
            RoutePosition::new(ObjectFileRef::way(first.way_offsets[0]), 0, 0),
            RoutePosition::new(ObjectFileRef::way(second.way_offsets[1]), 1, 1),
            &mut RoutingParameter::default(),
        )
        .unwrap();

    assert_eq!(result.termination, Termination::Found);
    let points = service
        .route_to_points(result.route.as_ref().unwrap())
        .unwrap();
    let ids: Vec<u64> = points.iter().map(|p| p.id()).collect();
    // A through B and the twin C into the second database, ending at E.
    assert_eq!(ids.first(), Some(&a.id()));
    assert_eq!(ids.last(), Some(&e.id()));
    assert!(ids.contains(&c.id()));
    // The twin appears once, not duplicated.
    assert_eq!(ids.iter().filter(|id| **id == c.id()).count(), 1);
}
