//! The tile grid.

use arena_types::TileMapWire;
use serde::{Deserialize, Serialize};

/// Maximum tile weight representable in the binary codec (6 bits).
pub const MAX_WEIGHT: u8 = 63;

/// Default movement cost of a tile.
pub const DEFAULT_WEIGHT: u8 = 1;

/// Whether a tile can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Passable,
    Blocked,
}

/// One grid cell. `weight` is the cost of stepping *onto* this tile,
/// in `[1, 63]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    pub weight: u8,
}

impl Tile {
    pub const fn passable() -> Self {
        Self {
            kind: TileKind::Passable,
            weight: DEFAULT_WEIGHT,
        }
    }

    pub const fn blocked() -> Self {
        Self {
            kind: TileKind::Blocked,
            weight: DEFAULT_WEIGHT,
        }
    }
}

/// A rectangular grid of tiles. Row-major: `tiles[y][x]`, with exactly
/// `height` rows of length `width`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    tiles: Vec<Vec<Tile>>,
}

impl TileMap {
    /// Build a map from pre-shaped rows. Callers go through
    /// [`mapgen::create_empty`](crate::mapgen::create_empty) or the
    /// codec; this exists for those two paths.
    pub(crate) fn from_rows(width: u32, height: u32, tiles: Vec<Vec<Tile>>) -> Self {
        debug_assert_eq!(tiles.len() as u32, height);
        debug_assert!(tiles.iter().all(|row| row.len() as u32 == width));
        Self {
            width,
            height,
            tiles,
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    /// True iff `(x, y)` lies inside the grid.
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// The tile at `(x, y)`, or `None` when out of bounds.
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.tiles.get(y as usize).and_then(|row| row.get(x as usize))
    }

    /// False when out of bounds or blocked.
    pub fn is_passable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_some_and(|t| t.kind == TileKind::Passable)
    }

    /// Movement cost of stepping onto `(x, y)`. Out-of-bounds tiles
    /// have no cost; callers check passability first.
    pub fn weight(&self, x: i32, y: i32) -> u32 {
        self.tile(x, y).map_or(u32::from(DEFAULT_WEIGHT), |t| u32::from(t.weight))
    }

    /// Overwrite the kind of an in-bounds tile; no-op otherwise.
    pub fn set_kind(&mut self, x: i32, y: i32, kind: TileKind) {
        if self.in_bounds(x, y) {
            self.tiles[y as usize][x as usize].kind = kind;
        }
    }

    /// Overwrite the weight of an in-bounds tile, clamped to `[1, 63]`;
    /// no-op when out of bounds.
    pub fn set_weight(&mut self, x: i32, y: i32, weight: u8) {
        if self.in_bounds(x, y) {
            self.tiles[y as usize][x as usize].weight = weight.clamp(DEFAULT_WEIGHT, MAX_WEIGHT);
        }
    }

    /// Count of passable tiles, used by spawn retry budgeting.
    pub fn passable_count(&self) -> usize {
        self.tiles
            .iter()
            .flatten()
            .filter(|t| t.kind == TileKind::Passable)
            .count()
    }

    /// Project the grid into its one-byte-per-cell wire form (same cell
    /// layout as the binary codec body).
    pub fn to_wire(&self) -> TileMapWire {
        let mut cells = Vec::with_capacity((self.width * self.height) as usize);
        for row in &self.tiles {
            for tile in row {
                cells.push(crate::codec::encode_tile(tile));
            }
        }
        TileMapWire {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mapgen;

    #[test]
    fn bounds_checks() {
        let map = mapgen::create_empty(4, 3);
        assert!(map.in_bounds(0, 0));
        assert!(map.in_bounds(3, 2));
        assert!(!map.in_bounds(4, 0));
        assert!(!map.in_bounds(0, 3));
        assert!(!map.in_bounds(-1, 0));
    }

    #[test]
    fn oob_is_never_passable() {
        let map = mapgen::create_empty(2, 2);
        assert!(!map.is_passable(-1, 0));
        assert!(!map.is_passable(2, 2));
        assert!(map.is_passable(1, 1));
    }

    #[test]
    fn set_weight_clamps_to_codec_range() {
        let mut map = mapgen::create_empty(2, 2);
        map.set_weight(0, 0, 0);
        assert_eq!(map.weight(0, 0), 1);
        map.set_weight(0, 0, 200);
        assert_eq!(map.weight(0, 0), 63);
    }

    #[test]
    fn wire_form_has_one_byte_per_cell() {
        let mut map = mapgen::create_empty(3, 2);
        map.set_kind(1, 1, TileKind::Blocked);
        let wire = map.to_wire();
        assert_eq!(wire.cells.len(), 6);
        assert_eq!(wire.cells[4], 1); // (1,1) row-major index 1*3+1
    }
}
