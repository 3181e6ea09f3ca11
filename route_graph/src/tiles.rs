use geom::GeoCoord;

/// A cell of the route-node tile grid.
pub type Tile = (u32, u32);

/// Which tile a coordinate falls into at the given magnification. Tiles are
/// 360/2^mag degrees wide and 180/2^mag degrees tall.
pub fn tile_of(coord: GeoCoord, mag: u8) -> Tile {
    let cells = f64::from(1_u32 << mag);
    let x = ((coord.lon + 180.0) / (360.0 / cells)) as u32;
    let y = ((coord.lat + 90.0) / (180.0 / cells)) as u32;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_differ() {
        let mag = 13;
        let a = tile_of(GeoCoord::new(48.0, 11.0), mag);
        let b = tile_of(GeoCoord::new(48.0, 11.1), mag);
        assert_ne!(a, b);
        // Within one cell width, same tile
        let c = tile_of(GeoCoord::new(48.0, 11.001), mag);
        assert_eq!(a, c);
    }
}
