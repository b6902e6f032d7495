//! Tile map and spawn placement oracle
//!
//! The map is a character grid: `'0'` is empty, anything else is solid.
//! Out-of-grid lookups are solid so nothing ever spawns into the void.

use std::io;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

/// World pixels per tile
pub const TILE_SIZE: f32 = 16.0;

/// Margin past the grid edge before a projectile is discarded
const PROJECTILE_MARGIN: f32 = 50.0;

/// Spawn position handed out when the map has no usable floor tile.
/// Spawning must never block game start.
const FALLBACK_SPAWN: (f32, f32) = (100.0, 100.0);

/// Compiled-in arena layout: ground with two pits, a center shop platform
/// and side/mid platforms.
const DEFAULT_LAYOUT: &str = "\
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000011111110000000000000000000000000
0111111100000000000000000000000000000000000000000011111110
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000011111110000000000000000000000111111100000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
0000000000000000000000000000000000000000000000000000000000
1111111111111111111100001111111111000011111111111111111111
1111111111111111111100001111111111000011111111111111111111
1111111111111111111100001111111111000011111111111111111111";

/// Parsed tile grid plus the derived set of valid floor tiles
pub struct GameMap {
    tiles: Vec<Vec<bool>>,
    cols: usize,
    rows: usize,
    /// Tiles that are solid with empty space directly above, as (col, row)
    floor_tiles: Vec<(usize, usize)>,
}

impl GameMap {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .collect();
        let cols = lines.iter().map(|l| l.len()).max().unwrap_or(0);

        // Pad ragged rows to a uniform width; a missing cell is empty.
        let tiles: Vec<Vec<bool>> = lines
            .iter()
            .map(|line| {
                let mut row: Vec<bool> = line.chars().map(|c| c != '0').collect();
                row.resize(cols, false);
                row
            })
            .collect();
        let rows = tiles.len();

        let mut floor_tiles = Vec::new();
        for r in 1..rows {
            for c in 0..cols {
                if tiles[r][c] && !tiles[r - 1][c] {
                    floor_tiles.push((c, r));
                }
            }
        }

        Self {
            tiles,
            cols,
            rows,
            floor_tiles,
        }
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn default_layout() -> Self {
        Self::parse(DEFAULT_LAYOUT)
    }

    /// Tile solidity; any coordinate outside the grid is solid
    pub fn is_solid(&self, col: i64, row: i64) -> bool {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return true;
        }
        self.tiles[row as usize][col as usize]
    }

    pub fn width_px(&self) -> f32 {
        self.cols as f32 * TILE_SIZE
    }

    pub fn height_px(&self) -> f32 {
        self.rows as f32 * TILE_SIZE
    }

    /// Random position whose bottom rests on a solid tile with headroom.
    /// Falls back to a fixed coordinate when no floor tile exists.
    pub fn random_floor_position(&self, rng: &mut impl Rng, entity_height: f32) -> (f32, f32) {
        match self.floor_tiles.choose(rng) {
            Some(&(c, r)) => (c as f32 * TILE_SIZE, r as f32 * TILE_SIZE - entity_height),
            None => FALLBACK_SPAWN,
        }
    }

    /// True once a projectile has left the playable area
    pub fn projectile_out_of_bounds(&self, x: f32, y: f32) -> bool {
        x < -PROJECTILE_MARGIN
            || x > self.width_px() + PROJECTILE_MARGIN
            || y > self.height_px() + PROJECTILE_MARGIN
    }

    /// Lower kill bound for players; anything below has fallen off the map
    pub fn below_world(&self, y: f32) -> bool {
        y > self.height_px()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_map() -> GameMap {
        // 4x3 grid, bottom row solid
        GameMap::parse("0000\n0000\n1111")
    }

    #[test]
    fn out_of_bounds_is_solid() {
        let map = small_map();
        assert!(map.is_solid(-1, 0));
        assert!(map.is_solid(0, -1));
        assert!(map.is_solid(4, 0));
        assert!(map.is_solid(0, 3));
        assert!(!map.is_solid(0, 0));
        assert!(map.is_solid(0, 2));
    }

    #[test]
    fn ragged_rows_pad_as_empty() {
        let map = GameMap::parse("0000\n11\n1111");
        assert!(map.is_solid(1, 1));
        assert!(!map.is_solid(2, 1));
        assert!(map.is_solid(2, 2));
    }

    #[test]
    fn floor_position_rests_on_solid_tile() {
        let map = small_map();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let (x, y) = map.random_floor_position(&mut rng, 13.0);
            let col = (x / TILE_SIZE) as i64;
            let floor_row = ((y + 13.0) / TILE_SIZE).round() as i64;
            assert!(map.is_solid(col, floor_row));
            assert!(!map.is_solid(col, floor_row - 1));
        }
    }

    #[test]
    fn no_floor_returns_fallback() {
        let map = GameMap::parse("0000\n0000");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(map.random_floor_position(&mut rng, 13.0), (100.0, 100.0));
    }

    #[test]
    fn default_layout_has_floor_and_shop_platform() {
        let map = GameMap::default_layout();
        assert!(!map.floor_tiles.is_empty());
        // shop platform top at (464, 256) => col 29, row 16
        assert!(map.is_solid(29, 16));
        assert!(!map.is_solid(29, 15));
    }

    #[test]
    fn projectile_bounds() {
        let map = small_map();
        assert!(map.projectile_out_of_bounds(-51.0, 0.0));
        assert!(map.projectile_out_of_bounds(map.width_px() + 51.0, 0.0));
        assert!(map.projectile_out_of_bounds(0.0, map.height_px() + 51.0));
        assert!(!map.projectile_out_of_bounds(10.0, 10.0));
    }
}
