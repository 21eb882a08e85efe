//! Map generation: obstacle placement and primitive shapes.
//!
//! Obstacle placement supports a seeded mode for reproducible arenas.
//! The seeded path uses a small linear congruential generator rather
//! than `rand` so a seed produces the same arena on every platform and
//! every `rand` upgrade.

use rand::Rng;

use crate::tile::{Tile, TileKind, TileMap};

/// LCG over the classic `(s * 9301 + 49297) mod 233280` cycle,
/// yielding floats in `[0, 1)`.
struct Lcg {
    state: u64,
}

impl Lcg {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_f64(&mut self) -> f64 {
        self.state = (self.state.wrapping_mul(9301).wrapping_add(49297)) % 233_280;
        self.state as f64 / 233_280.0
    }
}

/// Create an all-passable map of the given dimensions.
pub fn create_empty(width: u32, height: u32) -> TileMap {
    let tiles = (0..height)
        .map(|_| (0..width).map(|_| Tile::passable()).collect())
        .collect();
    TileMap::from_rows(width, height, tiles)
}

/// Independently mark each tile blocked with probability `density`.
///
/// With a seed the LCG makes placement reproducible; without one the
/// thread-local generator is used.
pub fn add_random_obstacles(map: &mut TileMap, density: f64, seed: Option<u64>) {
    let mut lcg = seed.map(Lcg::new);
    let mut rng = rand::rng();

    for y in 0..map.height() as i32 {
        for x in 0..map.width() as i32 {
            let roll = match lcg.as_mut() {
                Some(l) => l.next_f64(),
                None => rng.random::<f64>(),
            };
            if roll < density {
                map.set_kind(x, y, TileKind::Blocked);
            }
        }
    }
}

/// Block every tile on the outer edge of the map.
pub fn add_border_walls(map: &mut TileMap) {
    let (w, h) = (map.width() as i32, map.height() as i32);
    for x in 0..w {
        map.set_kind(x, 0, TileKind::Blocked);
        map.set_kind(x, h - 1, TileKind::Blocked);
    }
    for y in 0..h {
        map.set_kind(0, y, TileKind::Blocked);
        map.set_kind(w - 1, y, TileKind::Blocked);
    }
}

/// Block a rectangle of tiles, clipped to the map bounds.
pub fn add_rectangle(map: &mut TileMap, x: i32, y: i32, width: i32, height: i32) {
    for dy in 0..height {
        for dx in 0..width {
            map.set_kind(x + dx, y + dy, TileKind::Blocked);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_is_fully_passable() {
        let map = create_empty(5, 5);
        assert_eq!(map.passable_count(), 25);
    }

    #[test]
    fn seeded_obstacles_are_reproducible() {
        let mut a = create_empty(16, 16);
        let mut b = create_empty(16, 16);
        add_random_obstacles(&mut a, 0.3, Some(1234));
        add_random_obstacles(&mut b, 0.3, Some(1234));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = create_empty(16, 16);
        let mut b = create_empty(16, 16);
        add_random_obstacles(&mut a, 0.3, Some(1));
        add_random_obstacles(&mut b, 0.3, Some(2));
        assert_ne!(a, b);
    }

    #[test]
    fn density_zero_blocks_nothing() {
        let mut map = create_empty(8, 8);
        add_random_obstacles(&mut map, 0.0, None);
        assert_eq!(map.passable_count(), 64);
    }

    #[test]
    fn density_one_blocks_everything() {
        let mut map = create_empty(8, 8);
        add_random_obstacles(&mut map, 1.0, None);
        assert_eq!(map.passable_count(), 0);
    }

    #[test]
    fn border_walls_leave_interior_open() {
        let mut map = create_empty(4, 4);
        add_border_walls(&mut map);
        assert!(!map.is_passable(0, 0));
        assert!(!map.is_passable(3, 1));
        assert!(map.is_passable(1, 1));
        assert!(map.is_passable(2, 2));
    }

    #[test]
    fn rectangle_is_clipped_to_bounds() {
        let mut map = create_empty(4, 4);
        add_rectangle(&mut map, 2, 2, 10, 10);
        assert!(!map.is_passable(2, 2));
        assert!(!map.is_passable(3, 3));
        assert!(map.is_passable(1, 1));
        assert_eq!(map.passable_count(), 12);
    }
}
