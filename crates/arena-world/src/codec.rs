//! Binary tile-map format (`.map`).
//!
//! Layout, little-endian:
//!
//! ```text
//! u32 width | u32 height | width*height cell bytes (row-major, y outer)
//! ```
//!
//! Each cell byte packs the tile kind in bits 0-1 (0 = passable,
//! 1 = blocked) and the weight in bits 2-7 (0 meaning "default").
//! Deserialization refuses truncated or oversized input outright; a
//! partially constructed map is never returned.

use thiserror::Error;

use crate::tile::{Tile, TileKind, TileMap, DEFAULT_WEIGHT};

/// Size of the `width`/`height` header in bytes.
const HEADER_LEN: usize = 8;

/// Cell-byte kind values.
const KIND_PASSABLE: u8 = 0;
const KIND_BLOCKED: u8 = 1;

/// Errors produced when decoding a binary map.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input shorter than the 8-byte header.
    #[error("map data too short: {len} bytes, need at least {HEADER_LEN}")]
    TooShort {
        /// Length of the rejected input.
        len: usize,
    },

    /// Width or height of zero.
    #[error("invalid map dimensions: {width}x{height}")]
    BadDimensions { width: u32, height: u32 },

    /// Body length does not match `width * height`.
    #[error("map length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A cell byte carries an unknown kind value in bits 0-1.
    #[error("unknown tile kind {kind} at cell index {index}")]
    UnknownKind { kind: u8, index: usize },
}

/// Pack a tile into its cell byte.
pub(crate) fn encode_tile(tile: &Tile) -> u8 {
    let kind = match tile.kind {
        TileKind::Passable => KIND_PASSABLE,
        TileKind::Blocked => KIND_BLOCKED,
    };
    // A default weight is stored as 0 so untouched tiles stay compact.
    let weight = if tile.weight == DEFAULT_WEIGHT {
        0
    } else {
        tile.weight & 0x3f
    };
    kind | (weight << 2)
}

fn decode_tile(byte: u8, index: usize) -> Result<Tile, CodecError> {
    let kind = match byte & 0x03 {
        KIND_PASSABLE => TileKind::Passable,
        KIND_BLOCKED => TileKind::Blocked,
        other => return Err(CodecError::UnknownKind { kind: other, index }),
    };
    let raw_weight = byte >> 2;
    let weight = if raw_weight == 0 {
        DEFAULT_WEIGHT
    } else {
        raw_weight
    };
    Ok(Tile { kind, weight })
}

/// Serialize a map to its binary form.
pub fn serialize(map: &TileMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + (map.width() * map.height()) as usize);
    out.extend_from_slice(&map.width().to_le_bytes());
    out.extend_from_slice(&map.height().to_le_bytes());
    for y in 0..map.height() as i32 {
        for x in 0..map.width() as i32 {
            if let Some(tile) = map.tile(x, y) {
                out.push(encode_tile(tile));
            }
        }
    }
    out
}

/// Deserialize a binary map.
///
/// # Errors
///
/// Returns [`CodecError`] when the input is truncated, has zero
/// dimensions, has a body length that disagrees with the header, or
/// contains an unknown tile kind.
pub fn deserialize(data: &[u8]) -> Result<TileMap, CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::TooShort { len: data.len() });
    }

    let width = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let height = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if width == 0 || height == 0 {
        return Err(CodecError::BadDimensions { width, height });
    }

    let expected = HEADER_LEN + (width as usize) * (height as usize);
    if data.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    let body = &data[HEADER_LEN..];
    let mut tiles = Vec::with_capacity(height as usize);
    for y in 0..height as usize {
        let mut row = Vec::with_capacity(width as usize);
        for x in 0..width as usize {
            let index = y * width as usize + x;
            row.push(decode_tile(body[index], index)?);
        }
        tiles.push(row);
    }

    Ok(TileMap::from_rows(width, height, tiles))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mapgen;

    #[test]
    fn three_by_three_roundtrip() {
        // (1,1) blocked, (0,0) weight 7: 8-byte header + 9 cells = 17 bytes.
        let mut map = mapgen::create_empty(3, 3);
        map.set_kind(1, 1, TileKind::Blocked);
        map.set_weight(0, 0, 7);

        let bytes = serialize(&map);
        assert_eq!(bytes.len(), 17);

        let back = deserialize(&bytes).unwrap();
        assert_eq!(back, map);
        assert!(!back.is_passable(1, 1));
        assert_eq!(back.weight(0, 0), 7);
    }

    #[test]
    fn default_weight_encodes_as_zero() {
        let map = mapgen::create_empty(1, 1);
        let bytes = serialize(&map);
        assert_eq!(bytes[8], 0);
        // And zero decodes back to the default weight of 1.
        let back = deserialize(&bytes).unwrap();
        assert_eq!(back.weight(0, 0), 1);
    }

    #[test]
    fn rejects_truncated_header() {
        assert_eq!(
            deserialize(&[1, 0, 0]),
            Err(CodecError::TooShort { len: 3 })
        );
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        assert_eq!(
            deserialize(&data),
            Err(CodecError::BadDimensions {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        let map = mapgen::create_empty(2, 2);
        let mut bytes = serialize(&map);
        bytes.push(0);
        assert_eq!(
            deserialize(&bytes),
            Err(CodecError::LengthMismatch {
                expected: 12,
                actual: 13
            })
        );
    }

    #[test]
    fn rejects_unknown_tile_kind() {
        let map = mapgen::create_empty(1, 1);
        let mut bytes = serialize(&map);
        bytes[8] = 0x03;
        assert_eq!(
            deserialize(&bytes),
            Err(CodecError::UnknownKind { kind: 3, index: 0 })
        );
    }

    #[test]
    fn max_weight_roundtrips() {
        let mut map = mapgen::create_empty(2, 1);
        map.set_weight(1, 0, 63);
        let back = deserialize(&serialize(&map)).unwrap();
        assert_eq!(back.weight(1, 0), 63);
    }

    #[test]
    fn larger_map_roundtrips_structurally() {
        let mut map = mapgen::create_empty(20, 20);
        mapgen::add_random_obstacles(&mut map, 0.25, Some(99));
        map.set_weight(5, 5, 12);
        let back = deserialize(&serialize(&map)).unwrap();
        assert_eq!(back, map);
    }
}
