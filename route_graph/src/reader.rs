//! Query-time access to a tiled route-node file. Paths reference their
//! targets by id; the id encodes the quantized coordinate, the coordinate
//! names the tile, and the tile table names the file range to load. Loaded
//! tiles are kept in a small LRU with a per-tile id hash.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use map_data::{coord_from_id, NodeId};
use osmio::{FileOffset, FileScanner, ScannerMode};

use crate::route_node::RouteNode;
use crate::tiles::{tile_of, Tile};

const DEFAULT_CACHED_TILES: usize = 64;

pub struct RouteNodeFile {
    scanner: FileScanner,
    tile_mag: u8,
    node_count: u32,
    tiles: HashMap<Tile, (FileOffset, u32)>,
    loaded: HashMap<Tile, HashMap<NodeId, Arc<RouteNode>>>,
    lru: VecDeque<Tile>,
    max_cached_tiles: usize,
}

impl RouteNodeFile {
    pub fn open(path: &str, use_mmap: bool) -> Result<RouteNodeFile> {
        let mut scanner = FileScanner::open(path, ScannerMode::Random, use_mmap)?;
        let index_offset = scanner.read_u64()?;
        let node_count = scanner.read_u32()?;
        let tile_mag = scanner.read_u8()?;

        scanner.seek(index_offset)?;
        let tile_count = scanner.read_u32()?;
        let mut tiles = HashMap::with_capacity(tile_count as usize);
        for _ in 0..tile_count {
            let x = scanner.read_u32()?;
            let y = scanner.read_u32()?;
            let offset = scanner.read_u64()?;
            let count = scanner.read_u32()?;
            tiles.insert((x, y), (offset, count));
        }

        Ok(RouteNodeFile {
            scanner,
            tile_mag,
            node_count,
            tiles,
            loaded: HashMap::new(),
            lru: VecDeque::new(),
            max_cached_tiles: DEFAULT_CACHED_TILES,
        })
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn tile_mag(&self) -> u8 {
        self.tile_mag
    }

    /// Looks a node up by id, loading its tile on a cache miss. `None` means
    /// the id isn't in this database (possibly a twin in another one).
    pub fn node_by_id(&mut self, id: NodeId) -> Result<Option<Arc<RouteNode>>> {
        let tile = tile_of(coord_from_id(id), self.tile_mag);
        if !self.loaded.contains_key(&tile) {
            self.load_tile(tile)?;
        } else {
            // Refresh LRU position
            if let Some(pos) = self.lru.iter().position(|t| *t == tile) {
                self.lru.remove(pos);
                self.lru.push_back(tile);
            }
        }
        Ok(self.loaded.get(&tile).and_then(|map| map.get(&id)).cloned())
    }

    fn load_tile(&mut self, tile: Tile) -> Result<()> {
        let mut map = HashMap::new();
        if let Some((offset, count)) = self.tiles.get(&tile).copied() {
            self.scanner.seek(offset)?;
            for _ in 0..count {
                let node = RouteNode::read(&mut self.scanner)?;
                map.insert(node.id, Arc::new(node));
            }
        }

        while self.lru.len() >= self.max_cached_tiles {
            if let Some(evicted) = self.lru.pop_front() {
                self.loaded.remove(&evicted);
            }
        }
        self.loaded.insert(tile, map);
        self.lru.push_back(tile);
        Ok(())
    }

    /// Every node id in the file, in storage order. Used to build the
    /// cross-database twin map; bypasses the tile cache.
    pub fn all_ids(&mut self) -> Result<Vec<NodeId>> {
        let mut entries: Vec<(FileOffset, u32)> = self.tiles.values().copied().collect();
        entries.sort();

        let mut ids = Vec::with_capacity(self.node_count as usize);
        for (offset, count) in entries {
            self.scanner.seek(offset)?;
            for _ in 0..count {
                ids.push(RouteNode::read(&mut self.scanner)?.id);
            }
        }
        Ok(ids)
    }
}
