use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vehicle {
    Foot,
    Bicycle,
    Car,
}

impl Vehicle {
    pub const ALL: [Vehicle; 3] = [Vehicle::Foot, Vehicle::Bicycle, Vehicle::Car];

    pub fn mask(self) -> VehicleMask {
        match self {
            Vehicle::Foot => 1,
            Vehicle::Bicycle => 2,
            Vehicle::Car => 4,
        }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Vehicle::Foot => write!(f, "foot"),
            Vehicle::Bicycle => write!(f, "bicycle"),
            Vehicle::Car => write!(f, "car"),
        }
    }
}

/// A set of vehicles, one bit each.
pub type VehicleMask = u8;

/// Who may traverse a way, per direction. The import preprocessor resolves
/// the access tags; ways without explicit tags fall back to their type's
/// default (see `TypeConfig`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessValue {
    pub foot_forward: bool,
    pub foot_backward: bool,
    pub bicycle_forward: bool,
    pub bicycle_backward: bool,
    pub car_forward: bool,
    pub car_backward: bool,
}

impl AccessValue {
    pub fn none() -> AccessValue {
        AccessValue {
            foot_forward: false,
            foot_backward: false,
            bicycle_forward: false,
            bicycle_backward: false,
            car_forward: false,
            car_backward: false,
        }
    }

    /// Both directions for the given vehicles.
    pub fn bidirectional(foot: bool, bicycle: bool, car: bool) -> AccessValue {
        AccessValue {
            foot_forward: foot,
            foot_backward: foot,
            bicycle_forward: bicycle,
            bicycle_backward: bicycle,
            car_forward: car,
            car_backward: car,
        }
    }

    /// Restrict the given vehicle to the forward direction (a oneway).
    pub fn oneway_for(mut self, vehicle: Vehicle) -> AccessValue {
        match vehicle {
            Vehicle::Foot => self.foot_backward = false,
            Vehicle::Bicycle => self.bicycle_backward = false,
            Vehicle::Car => self.car_backward = false,
        }
        self
    }

    pub fn can_route_forward(&self, vehicle: Vehicle) -> bool {
        match vehicle {
            Vehicle::Foot => self.foot_forward,
            Vehicle::Bicycle => self.bicycle_forward,
            Vehicle::Car => self.car_forward,
        }
    }

    pub fn can_route_backward(&self, vehicle: Vehicle) -> bool {
        match vehicle {
            Vehicle::Foot => self.foot_backward,
            Vehicle::Bicycle => self.bicycle_backward,
            Vehicle::Car => self.car_backward,
        }
    }

    pub fn can_route(&self, vehicle: Vehicle) -> bool {
        self.can_route_forward(vehicle) || self.can_route_backward(vehicle)
    }

    /// Any of the masked vehicles can traverse in some direction.
    pub fn can_route_any(&self, vehicles: VehicleMask) -> bool {
        Vehicle::ALL
            .iter()
            .any(|v| vehicles & v.mask() != 0 && self.can_route(*v))
    }

    pub fn any_forward(&self) -> bool {
        self.foot_forward || self.bicycle_forward || self.car_forward
    }

    pub fn any_backward(&self) -> bool {
        self.foot_backward || self.bicycle_backward || self.car_backward
    }

    pub fn to_byte(&self) -> u8 {
        let mut b = 0;
        if self.foot_forward {
            b |= 1 << 0;
        }
        if self.foot_backward {
            b |= 1 << 1;
        }
        if self.bicycle_forward {
            b |= 1 << 2;
        }
        if self.bicycle_backward {
            b |= 1 << 3;
        }
        if self.car_forward {
            b |= 1 << 4;
        }
        if self.car_backward {
            b |= 1 << 5;
        }
        b
    }

    pub fn from_byte(b: u8) -> AccessValue {
        AccessValue {
            foot_forward: b & (1 << 0) != 0,
            foot_backward: b & (1 << 1) != 0,
            bicycle_forward: b & (1 << 2) != 0,
            bicycle_backward: b & (1 << 3) != 0,
            car_forward: b & (1 << 4) != 0,
            car_backward: b & (1 << 5) != 0,
        }
    }
}

/// Destination-only access ("access=destination"): the way may only be
/// entered to reach something inside its zone, never traversed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedValue {
    pub foot: bool,
    pub bicycle: bool,
    pub car: bool,
}

impl RestrictedValue {
    pub fn none() -> RestrictedValue {
        RestrictedValue {
            foot: false,
            bicycle: false,
            car: false,
        }
    }

    pub fn for_vehicle(&self, vehicle: Vehicle) -> bool {
        match vehicle {
            Vehicle::Foot => self.foot,
            Vehicle::Bicycle => self.bicycle,
            Vehicle::Car => self.car,
        }
    }

    pub fn to_byte(&self) -> u8 {
        let mut b = 0;
        if self.foot {
            b |= 1 << 0;
        }
        if self.bicycle {
            b |= 1 << 1;
        }
        if self.car {
            b |= 1 << 2;
        }
        b
    }

    pub fn from_byte(b: u8) -> RestrictedValue {
        RestrictedValue {
            foot: b & (1 << 0) != 0,
            bicycle: b & (1 << 1) != 0,
            car: b & (1 << 2) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_roundtrip() {
        let access = AccessValue::bidirectional(true, true, false).oneway_for(Vehicle::Bicycle);
        assert_eq!(AccessValue::from_byte(access.to_byte()), access);
        assert!(access.can_route(Vehicle::Bicycle));
        assert!(!access.can_route_backward(Vehicle::Bicycle));
        assert!(!access.can_route(Vehicle::Car));
        assert!(access.can_route_any(Vehicle::Car.mask() | Vehicle::Foot.mask()));
        assert!(!access.can_route_any(Vehicle::Car.mask()));
    }
}
