use std::fmt;

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 coordinate. Latitude is in [-90, 90], longitude in [-180, 180].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> GeoCoord {
        debug_assert!((-90.0..=90.0).contains(&lat), "latitude {} out of range", lat);
        debug_assert!(
            (-180.0..=180.0).contains(&lon),
            "longitude {} out of range",
            lon
        );
        GeoCoord { lat, lon }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: GeoCoord) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * a.sqrt().asin() * EARTH_RADIUS_METERS
    }
}

impl fmt::Display for GeoCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.7}, {:.7})", self.lat, self.lon)
    }
}

/// Axis-aligned bounding box in lat/lon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> GeoBox {
        GeoBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn from_ring(ring: &[GeoCoord]) -> GeoBox {
        assert!(!ring.is_empty());
        let mut b = GeoBox {
            min_lat: ring[0].lat,
            min_lon: ring[0].lon,
            max_lat: ring[0].lat,
            max_lon: ring[0].lon,
        };
        for c in &ring[1..] {
            b.min_lat = b.min_lat.min(c.lat);
            b.min_lon = b.min_lon.min(c.lon);
            b.max_lat = b.max_lat.max(c.lat);
            b.max_lon = b.max_lon.max(c.lon);
        }
        b
    }

    pub fn union(self, other: GeoBox) -> GeoBox {
        GeoBox {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Standard 1-D interval intersection in each axis.
    pub fn overlaps(&self, other: &GeoBox) -> bool {
        !(other.max_lon < self.min_lon
            || other.min_lon > self.max_lon
            || other.max_lat < self.min_lat
            || other.min_lat > self.max_lat)
    }

    pub fn contains_coord(&self, c: GeoCoord) -> bool {
        c.lat >= self.min_lat && c.lat <= self.max_lat && c.lon >= self.min_lon && c.lon <= self.max_lon
    }

    pub fn contains_box(&self, other: &GeoBox) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    pub fn center(&self) -> GeoCoord {
        GeoCoord::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn min_coord(&self) -> GeoCoord {
        GeoCoord::new(self.min_lat, self.min_lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_sanity() {
        // Munich Marienplatz to Odeonsplatz, roughly 750m
        let a = GeoCoord::new(48.137154, 11.576124);
        let b = GeoCoord::new(48.142497, 11.577734);
        let d = a.distance_to(b);
        assert!(d > 550.0 && d < 650.0, "got {}", d);
        assert!((a.distance_to(a)).abs() < 1e-9);
        // symmetric
        assert!((a.distance_to(b) - b.distance_to(a)).abs() < 1e-9);
    }

    #[test]
    fn box_overlap() {
        let a = GeoBox::new(0.0, 0.0, 10.0, 10.0);
        let b = GeoBox::new(5.0, 5.0, 15.0, 15.0);
        let c = GeoBox::new(11.0, 11.0, 12.0, 12.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        // Touching edges still overlap
        let d = GeoBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.overlaps(&d));
    }

    #[test]
    fn box_union_bounds() {
        let a = GeoBox::new(0.0, 0.0, 1.0, 1.0);
        let b = GeoBox::new(-1.0, 0.5, 0.5, 2.0);
        let u = a.union(b);
        assert!(u.contains_box(&a));
        assert!(u.contains_box(&b));
    }
}
