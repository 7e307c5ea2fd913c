//! The metatile container: one blob holding every sub-tile of an 8×8 block
//! in one or more formats, plus optional per-sub-tile JSON metadata.
//!
//! Layout, all integers little-endian i32:
//!
//! ```text
//! for each format (then `json` if metadata is present):
//!     "META"  n_tiles=64  tile_x  tile_y  tile_z  format_code
//!     64 × (offset, size)          offsets relative to container start
//! payloads, formats in header order, sub-tiles row-major
//! ```
//!
//! Sub-tiles that do not exist (sparse low zoom) have `(0, 0)` table
//! entries. Readers walk headers until the magic stops matching and treat a
//! table that would run past the buffer as the end of the container.

mod reader;
mod writer;

pub use reader::{MetatileReader, TileSet};
pub use writer::MetatileWriter;

use tilesmith_core::{METATILE, MetatileCoord};

/// Bytes in one header block: magic + five i32 fields.
pub(crate) const HEADER_SIZE: u64 = 4 + 5 * 4;

/// Bytes in one offset table: 64 entries of two i32.
pub(crate) const TABLE_SIZE: u64 = (METATILE * METATILE) as u64 * 8;

pub(crate) const MAGIC: &[u8; 4] = b"META";

/// Position of sub-tile `(row, col)` in the 64-entry table.
pub(crate) fn table_index(coord: &MetatileCoord, row: u32, col: u32) -> usize {
	MetatileCoord::tile_offset(coord.x + col, coord.y + row) as usize
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;
	use tilesmith_core::{Blob, FormatName, TileCoord, TileFormat};

	fn test_coord() -> MetatileCoord {
		MetatileCoord::from_tile(&TileCoord::new(15, 19294, 24642).unwrap())
	}

	fn tile_map(size: u32, tag: u8) -> BTreeMap<(u32, u32), Blob> {
		let mut map = BTreeMap::new();
		for row in 0..size {
			for col in 0..size {
				map.insert(
					(row, col),
					Blob::from(vec![tag, row as u8, col as u8, 0xAB]),
				);
			}
		}
		map
	}

	#[test]
	fn round_trip_single_format() {
		let coord = test_coord();
		let tiles = BTreeMap::from([(FormatName::Png, tile_map(8, 1))]);
		let blob = MetatileWriter::write(&coord, 8, &[FormatName::Png], &tiles, None).unwrap();

		let reader = MetatileReader::new(blob);
		assert_eq!(reader.tilesets().len(), 1);
		let set = &reader.tilesets()[0];
		assert_eq!(set.format, TileFormat::PNG);
		assert_eq!((set.x, set.y, set.z), (coord.x, coord.y, coord.z));
		for row in 0..8 {
			for col in 0..8 {
				let bytes = reader.tile(set, row, col).unwrap();
				assert_eq!(bytes, &[1, row as u8, col as u8, 0xAB]);
			}
		}
	}

	#[test]
	fn round_trip_with_metadata() {
		let coord = test_coord();
		let formats = [FormatName::Png, FormatName::Jpeg];
		let tiles = BTreeMap::from([
			(FormatName::Png, tile_map(8, 1)),
			(FormatName::Jpeg, tile_map(8, 2)),
		]);
		let meta = tile_map(8, 3);
		let blob = MetatileWriter::write(&coord, 8, &formats, &tiles, Some(&meta)).unwrap();

		let reader = MetatileReader::new(blob);
		assert_eq!(reader.tilesets().len(), 3);
		assert_eq!(reader.image_set().unwrap().format, TileFormat::PNG);
		let json = reader.json_set().unwrap();
		assert_eq!(json.format, TileFormat::JSON);
		assert_eq!(reader.tile(json, 5, 6).unwrap(), &[3, 5, 6, 0xAB]);
	}

	#[test]
	fn magic_sits_at_offset_zero() {
		let coord = test_coord();
		let tiles = BTreeMap::from([(FormatName::Png, tile_map(8, 1))]);
		let blob = MetatileWriter::write(&coord, 8, &[FormatName::Png], &tiles, None).unwrap();
		assert_eq!(&blob.as_slice()[0..4], b"META");
		// 64 offset entries follow the header.
		assert_eq!(
			blob.len(),
			HEADER_SIZE + TABLE_SIZE + 64 * 4
		);
	}

	#[test]
	fn sparse_low_zoom_leaves_empty_entries() {
		let coord = MetatileCoord::from_tile(&TileCoord::new(1, 0, 0).unwrap());
		let tiles = BTreeMap::from([(FormatName::Png, tile_map(2, 9))]);
		let blob = MetatileWriter::write(&coord, 2, &[FormatName::Png], &tiles, None).unwrap();

		let reader = MetatileReader::new(blob);
		let set = &reader.tilesets()[0];
		assert!(reader.tile(set, 0, 0).is_some());
		assert!(reader.tile(set, 1, 1).is_some());
		assert!(reader.tile(set, 5, 5).is_none());
	}

	#[test]
	fn truncated_table_stops_the_read() {
		let coord = test_coord();
		let tiles = BTreeMap::from([(FormatName::Png, tile_map(8, 1))]);
		let blob = MetatileWriter::write(&coord, 8, &[FormatName::Png], &tiles, None).unwrap();

		// Cut into the offset table: the header alone no longer counts.
		let cut = Blob::from(&blob.as_slice()[0..(HEADER_SIZE + 100) as usize]);
		assert!(MetatileReader::new(cut).tilesets().is_empty());
	}

	#[test]
	fn bad_magic_stops_the_read() {
		let coord = test_coord();
		let formats = [FormatName::Png];
		let tiles = BTreeMap::from([(FormatName::Png, tile_map(8, 1))]);
		let blob = MetatileWriter::write(&coord, 8, &formats, &tiles, None).unwrap();

		let mut bytes = blob.into_vec();
		bytes[0] = b'X';
		assert!(MetatileReader::new(Blob::from(bytes)).tilesets().is_empty());
	}
}
