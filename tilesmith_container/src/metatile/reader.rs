use super::{HEADER_SIZE, MAGIC};
use anyhow::Result;
use tilesmith_core::io::ValueReaderSlice;
use tilesmith_core::{Blob, ByteRange, METATILE, TileFormat};

/// One format's slice table inside a container.
#[derive(Debug)]
pub struct TileSet {
	pub x: u32,
	pub y: u32,
	pub z: u8,
	pub format: TileFormat,
	pub tiles: Vec<ByteRange>,
}

/// Parses a metatile container and serves zero-copy sub-tile slices.
///
/// Parsing is tolerant by design: it stops at the first header whose magic
/// does not match and drops a trailing header whose offset table would run
/// past the buffer.
pub struct MetatileReader {
	blob: Blob,
	tilesets: Vec<TileSet>,
}

impl MetatileReader {
	pub fn new(blob: Blob) -> MetatileReader {
		let tilesets = Self::parse(blob.as_slice());
		MetatileReader { blob, tilesets }
	}

	fn parse(data: &[u8]) -> Vec<TileSet> {
		let mut tilesets = Vec::new();
		let mut reader = ValueReaderSlice::new(data);

		while (reader.position() as u64 + HEADER_SIZE) < data.len() as u64 {
			match Self::read_tileset(&mut reader) {
				Ok(Some(set)) => tilesets.push(set),
				Ok(None) | Err(_) => break,
			}
		}

		tilesets
	}

	fn read_tileset(reader: &mut ValueReaderSlice) -> Result<Option<TileSet>> {
		if reader.read_bytes(4)? != MAGIC {
			return Ok(None);
		}
		let n_tiles = reader.read_i32()? as u32;
		let x = reader.read_i32()? as u32;
		let y = reader.read_i32()? as u32;
		let z = reader.read_i32()? as u8;
		let format = TileFormat::from_code(reader.read_i32()? as u32)?;

		// The whole offset table has to fit in the remaining buffer.
		if reader.position() as u64 + u64::from(n_tiles) * 8 >= reader.len() as u64 {
			return Ok(None);
		}
		let mut tiles = Vec::with_capacity(n_tiles as usize);
		for _ in 0..n_tiles {
			let offset = reader.read_i32()? as u64;
			let length = reader.read_i32()? as u64;
			tiles.push(ByteRange::new(offset, length));
		}

		Ok(Some(TileSet { x, y, z, format, tiles }))
	}

	pub fn tilesets(&self) -> &[TileSet] {
		&self.tilesets
	}

	/// The first image (non-JSON) tile set, if any.
	pub fn image_set(&self) -> Option<&TileSet> {
		self.tilesets.iter().find(|set| set.format != TileFormat::JSON)
	}

	/// The JSON metadata tile set, if any.
	pub fn json_set(&self) -> Option<&TileSet> {
		self.tilesets.iter().find(|set| set.format == TileFormat::JSON)
	}

	/// Bytes of sub-tile `(row, col)` in a set, or `None` for absent
	/// sub-tiles and corrupt ranges.
	pub fn tile<'a>(&'a self, set: &TileSet, row: u32, col: u32) -> Option<&'a [u8]> {
		let index = (row * METATILE + col) as usize;
		let range = set.tiles.get(index)?;
		if range.is_empty() {
			return None;
		}
		self.blob.read_range(range).ok()
	}
}
