use geom::GeoCoord;

/// A stable 64-bit node identifier, derived from the quantized coordinate.
pub type NodeId = u64;

const LAT_BITS: u32 = 27;
const LON_BITS: u32 = 28;
const SERIAL_BITS: u32 = 8;

const LAT_CELLS: f64 = ((1_u64 << LAT_BITS) - 1) as f64;
const LON_CELLS: f64 = ((1_u64 << LON_BITS) - 1) as f64;

/// A vertex of a way or area ring. The serial disambiguates distinct OSM
/// nodes that quantize to the same grid cell; serial 0 marks a coordinate
/// that isn't shared between objects and so can never become a junction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub serial: u8,
    pub coord: GeoCoord,
}

impl Point {
    pub fn new(serial: u8, coord: GeoCoord) -> Point {
        Point { serial, coord }
    }

    /// Packs the 27-bit quantized latitude, 28-bit quantized longitude and
    /// the serial into one id. Two points with equal ids lie in the same
    /// quantization cell and carry the same serial.
    pub fn id(&self) -> NodeId {
        let qlat = ((self.coord.lat + 90.0) / 180.0 * LAT_CELLS).round() as u64;
        let qlon = ((self.coord.lon + 180.0) / 360.0 * LON_CELLS).round() as u64;
        (qlat << (LON_BITS + SERIAL_BITS)) | (qlon << SERIAL_BITS) | u64::from(self.serial)
    }

    /// Network-shareable nodes are the only junction candidates.
    pub fn is_relevant(&self) -> bool {
        self.serial != 0
    }
}

/// Recovers the quantized coordinate encoded in an id. The result is exact
/// on the id grid, which is all the tile lookup needs.
pub fn coord_from_id(id: NodeId) -> GeoCoord {
    let qlat = id >> (LON_BITS + SERIAL_BITS);
    let qlon = (id >> SERIAL_BITS) & ((1_u64 << LON_BITS) - 1);
    GeoCoord::new(
        (qlat as f64) / LAT_CELLS * 180.0 - 90.0,
        (qlon as f64) / LON_CELLS * 360.0 - 180.0,
    )
}
