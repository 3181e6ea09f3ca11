use std::collections::HashMap;

use geom::{coord_in_ring, GeoCoord};

use crate::region::Region;

/// The world is quantized into 2^16 x 2^16 cells for the region lookup.
pub const REGION_GRID_LEVEL: u32 = 16;

/// Path from the root to a region: the child index taken at each level. The
/// empty path is the root itself. Storing paths instead of references keeps
/// the tree mutable while the grid exists.
pub type RegionPath = Vec<usize>;

pub fn region_at<'a>(root: &'a Region, path: &[usize]) -> &'a Region {
    let mut region = root;
    for idx in path {
        region = &region.regions[*idx];
    }
    region
}

pub fn region_at_mut<'a>(root: &'a mut Region, path: &[usize]) -> &'a mut Region {
    let mut region = root;
    for idx in path {
        region = &mut region.regions[*idx];
    }
    region
}

/// Buckets every region into the grid cells its bounding box overlaps,
/// deepest level first. A cell's list is therefore ordered deepest-first,
/// and the first ring hit during lookup is the deepest containing region.
pub struct RegionGrid {
    cell_width: f64,
    cell_height: f64,
    index: HashMap<(u32, u32), Vec<RegionPath>>,
}

impl RegionGrid {
    pub fn build(root: &Region) -> RegionGrid {
        let cells = f64::from(1_u32 << REGION_GRID_LEVEL);
        let mut grid = RegionGrid {
            cell_width: 360.0 / cells,
            cell_height: 180.0 / cells,
            index: HashMap::new(),
        };

        // Group regions by level; the root (level 0) never goes into the
        // grid, it's the fallback.
        let mut by_level: Vec<Vec<RegionPath>> = vec![Vec::new(); root.depth()];
        collect_paths(root, &mut Vec::new(), 0, &mut by_level);

        for level in (1..by_level.len()).rev() {
            for path in &by_level[level] {
                let region = region_at(root, path);
                let min_x = grid.cell_x(region.bounds.min_lon);
                let max_x = grid.cell_x(region.bounds.max_lon);
                let min_y = grid.cell_y(region.bounds.min_lat);
                let max_y = grid.cell_y(region.bounds.max_lat);
                for y in min_y..=max_y {
                    for x in min_x..=max_x {
                        grid.index.entry((x, y)).or_default().push(path.clone());
                    }
                }
            }
        }

        grid
    }

    fn cell_x(&self, lon: f64) -> u32 {
        ((lon + 180.0) / self.cell_width) as u32
    }

    fn cell_y(&self, lat: f64) -> u32 {
        ((lat + 90.0) / self.cell_height) as u32
    }

    /// The deepest region whose ring contains the coordinate, or the root.
    pub fn region_for_coord(&self, root: &Region, coord: GeoCoord) -> RegionPath {
        let cell = (self.cell_x(coord.lon), self.cell_y(coord.lat));
        if let Some(paths) = self.index.get(&cell) {
            for path in paths {
                let region = region_at(root, path);
                if region.areas.iter().any(|ring| coord_in_ring(coord, ring)) {
                    return path.clone();
                }
            }
        }
        Vec::new()
    }
}

fn collect_paths(
    region: &Region,
    path: &mut Vec<usize>,
    level: usize,
    by_level: &mut Vec<Vec<RegionPath>>,
) {
    by_level[level].push(path.clone());
    for (idx, child) in region.regions.iter().enumerate() {
        path.push(idx);
        collect_paths(child, path, level + 1, by_level);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_data::ObjectFileRef;

    fn square_region(name: &str, offset: u64, min: f64, max: f64) -> Region {
        Region::new(
            name.to_string(),
            ObjectFileRef::area(offset),
            vec![vec![
                GeoCoord::new(min, min),
                GeoCoord::new(min, max),
                GeoCoord::new(max, max),
                GeoCoord::new(max, min),
            ]],
        )
    }

    #[test]
    fn lookup_returns_deepest() {
        let mut root = Region::root();
        root.add(square_region("State", 1, 0.0, 0.1));
        root.add(square_region("City", 2, 0.02, 0.05));

        let grid = RegionGrid::build(&root);
        let inner = grid.region_for_coord(&root, GeoCoord::new(0.03, 0.03));
        assert_eq!(region_at(&root, &inner).name, "City");
        let outer = grid.region_for_coord(&root, GeoCoord::new(0.07, 0.07));
        assert_eq!(region_at(&root, &outer).name, "State");
        let nowhere = grid.region_for_coord(&root, GeoCoord::new(50.0, 50.0));
        assert!(nowhere.is_empty());
    }

    #[test]
    fn empty_tree_falls_back_to_root() {
        let root = Region::root();
        let grid = RegionGrid::build(&root);
        assert!(grid
            .region_for_coord(&root, GeoCoord::new(48.0, 11.0))
            .is_empty());
    }

    #[test]
    fn random_lookups_agree_with_direct_containment() {
        use rand::{Rng, SeedableRng};
        use rand_xorshift::XorShiftRng;

        let mut root = Region::root();
        root.add(square_region("State", 1, 0.0, 0.1));
        root.add(square_region("City", 2, 0.02, 0.05));
        root.add(square_region("Suburb", 3, 0.03, 0.04));
        let grid = RegionGrid::build(&root);

        let state_ring = root.regions[0].areas[0].clone();
        let mut rng = XorShiftRng::from_seed([11; 16]);
        for _ in 0..2000 {
            let c = GeoCoord::new(rng.gen_range(-0.05..0.15), rng.gen_range(-0.05..0.15));
            let path = grid.region_for_coord(&root, c);
            let region = region_at(&root, &path);
            if coord_in_ring(c, &state_ring) {
                // The result must itself contain the coordinate, and since
                // lookups are deepest-first, it's State or a descendant.
                assert!(
                    region.areas.iter().any(|ring| coord_in_ring(c, ring)),
                    "{} resolved to non-containing region {}",
                    c,
                    region.name
                );
            } else {
                assert!(path.is_empty(), "{} should fall through to the root", c);
            }
        }
    }
}
