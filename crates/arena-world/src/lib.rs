//! The arena's spatial layer: tile grid, map generation, the binary
//! map codec, and A* pathfinding.
//!
//! # Modules
//!
//! - [`tile`] -- [`Tile`], [`TileMap`], bounds and passability queries.
//! - [`mapgen`] -- obstacle placement (seeded or unseeded), border
//!   walls, rectangles.
//! - [`codec`] -- the little-endian `.map` binary format.
//! - [`path`] -- 4-connected A* with per-tile costs.
//!
//! The grid is created once at world init and never resized.

pub mod codec;
pub mod mapgen;
pub mod path;
pub mod tile;

pub use codec::{deserialize, serialize, CodecError};
pub use path::{find_path, Path};
pub use tile::{Tile, TileKind, TileMap};
