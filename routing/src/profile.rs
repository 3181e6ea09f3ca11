use map_data::{TypeConfig, TypeId, Vehicle};
use route_graph::{ObjectVariant, RoutePath};

/// What the cost of an edge means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostMode {
    /// Meters traveled.
    Distance,
    /// Hours traveled at the effective speed.
    Time,
}

/// Default cost-limit parameters: routes whose estimated cost exceeds
/// `cost_of(20km) + 7.5 * cost_of(airline distance)` are pruned.
const COST_LIMIT_DISTANCE_M: f64 = 20_000.0;
const COST_LIMIT_FACTOR: f64 = 7.5;

fn vehicle_speed_cap(vehicle: Vehicle) -> f64 {
    match vehicle {
        Vehicle::Foot => 5.0,
        Vehicle::Bicycle => 20.0,
        Vehicle::Car => 160.0,
    }
}

/// The per-query cost model: one vehicle, a speed per object type, and the
/// limits that keep hopeless searches from flooding the open set. A plain
/// value, cheap to clone, immutable during a query.
#[derive(Clone, Debug)]
pub struct RoutingProfile {
    vehicle: Vehicle,
    mode: CostMode,
    /// km/h per type id; 0 means the profile refuses the type.
    speeds: Vec<f64>,
    /// The maximum attainable speed, used for the (admissible) estimate.
    max_speed: f64,
    pub cost_limit_distance_m: f64,
    pub cost_limit_factor: f64,
}

impl RoutingProfile {
    fn new(vehicle: Vehicle, mode: CostMode, config: &TypeConfig) -> RoutingProfile {
        let cap = vehicle_speed_cap(vehicle);
        let speeds: Vec<f64> = config
            .iter()
            .map(|info| {
                if !info.default_access.can_route(vehicle) {
                    0.0
                } else if info.max_speed > 0 {
                    f64::from(info.max_speed).min(cap)
                } else {
                    cap
                }
            })
            .collect();
        let max_speed = speeds.iter().cloned().fold(0.0, f64::max).max(cap);

        RoutingProfile {
            vehicle,
            mode,
            speeds,
            max_speed,
            cost_limit_distance_m: COST_LIMIT_DISTANCE_M,
            cost_limit_factor: COST_LIMIT_FACTOR,
        }
    }

    pub fn shortest_path(vehicle: Vehicle, config: &TypeConfig) -> RoutingProfile {
        RoutingProfile::new(vehicle, CostMode::Distance, config)
    }

    pub fn fastest_path(vehicle: Vehicle, config: &TypeConfig) -> RoutingProfile {
        RoutingProfile::new(vehicle, CostMode::Time, config)
    }

    pub fn vehicle(&self) -> Vehicle {
        self.vehicle
    }

    /// Overrides the assumed speed for one type, km/h. 0 bans the type.
    pub fn set_type_speed(&mut self, type_id: TypeId, speed: f64) {
        if (type_id as usize) < self.speeds.len() {
            self.speeds[type_id as usize] = speed;
            self.max_speed = self.speeds.iter().cloned().fold(0.0, f64::max);
        }
    }

    fn type_speed(&self, type_id: TypeId) -> f64 {
        self.speeds.get(type_id as usize).copied().unwrap_or(0.0)
    }

    /// Whether this profile may traverse the path at all.
    pub fn can_use(&self, path: &RoutePath, variant: ObjectVariant) -> bool {
        path.is_usable_by(self.vehicle) && self.type_speed(variant.type_id) > 0.0
    }

    fn effective_speed(&self, variant: ObjectVariant) -> f64 {
        let mut speed = self.type_speed(variant.type_id);
        if variant.max_speed > 0 {
            speed = speed.min(f64::from(variant.max_speed));
        }
        speed
    }

    /// Cost of traversing `distance_m` meters of the given variant.
    pub fn edge_cost(&self, variant: ObjectVariant, distance_m: f64) -> f64 {
        match self.mode {
            CostMode::Distance => distance_m,
            CostMode::Time => distance_m / 1000.0 / self.effective_speed(variant),
        }
    }

    /// Admissible estimate: the cost of the airline distance at the maximum
    /// attainable speed.
    pub fn cost_of_distance(&self, distance_m: f64) -> f64 {
        match self.mode {
            CostMode::Distance => distance_m,
            CostMode::Time => distance_m / 1000.0 / self.max_speed,
        }
    }

    /// Search is abandoned beyond this overall cost.
    pub fn cost_limit(&self, airline_distance_m: f64) -> f64 {
        self.cost_of_distance(self.cost_limit_distance_m)
            + self.cost_limit_factor * self.cost_of_distance(airline_distance_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_data::{AccessValue, TypeInfo};

    fn config() -> TypeConfig {
        let mut road = TypeInfo::new("road");
        road.default_access = AccessValue::bidirectional(true, true, true);
        road.max_speed = 100;
        let mut path = TypeInfo::new("path");
        path.default_access = AccessValue::bidirectional(true, false, false);
        TypeConfig::new(vec![road, path])
    }

    #[test]
    fn estimate_is_admissible() {
        let profile = RoutingProfile::fastest_path(Vehicle::Car, &config());
        let variant = ObjectVariant {
            type_id: 0,
            max_speed: 50,
            grade: 1,
        };
        // The estimate for a distance can never exceed the true edge cost.
        for d in [10.0, 500.0, 12_345.0] {
            assert!(profile.cost_of_distance(d) <= profile.edge_cost(variant, d) + 1e-12);
        }
    }

    #[test]
    fn car_refuses_foot_paths() {
        let profile = RoutingProfile::fastest_path(Vehicle::Car, &config());
        let variant = ObjectVariant {
            type_id: 1,
            max_speed: 0,
            grade: 1,
        };
        let path = RoutePath {
            target_id: 1,
            object_index: 0,
            flags: route_graph::flags::USABLE_BY_CAR,
            distance_m: 10.0,
        };
        // Even with the usable bit set, a type the profile has no speed for
        // is refused.
        assert!(!profile.can_use(&path, variant));
    }

    #[test]
    fn distance_mode_counts_meters() {
        let profile = RoutingProfile::shortest_path(Vehicle::Foot, &config());
        let variant = ObjectVariant {
            type_id: 1,
            max_speed: 0,
            grade: 1,
        };
        assert_eq!(profile.edge_cost(variant, 123.0), 123.0);
    }

    #[test]
    fn cost_limit_scales_with_airline_distance() {
        let profile = RoutingProfile::shortest_path(Vehicle::Car, &config());
        assert!(profile.cost_limit(10_000.0) < profile.cost_limit(50_000.0));
    }
}
