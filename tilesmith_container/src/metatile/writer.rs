use super::{HEADER_SIZE, MAGIC, TABLE_SIZE, table_index};
use anyhow::{Result, ensure};
use std::collections::BTreeMap;
use tilesmith_core::io::ValueWriterBlob;
use tilesmith_core::{Blob, FormatName, METATILE, MetatileCoord, TileFormat};

/// Packs transcoded sub-tiles into one metatile container.
pub struct MetatileWriter;

impl MetatileWriter {
	/// Serializes `tiles` (one map per image format, keyed `(row, col)`)
	/// plus optional JSON metadata into a container. `formats` fixes the
	/// header order; every listed format must have a complete `size × size`
	/// tile map.
	pub fn write(
		coord: &MetatileCoord,
		size: u32,
		formats: &[FormatName],
		tiles: &BTreeMap<FormatName, BTreeMap<(u32, u32), Blob>>,
		meta: Option<&BTreeMap<(u32, u32), Blob>>,
	) -> Result<Blob> {
		ensure!(size >= 1 && size <= METATILE, "invalid metatile size {size}");

		let mut blocks: Vec<(TileFormat, &BTreeMap<(u32, u32), Blob>)> = Vec::new();
		for format in formats {
			let map = tiles
				.get(format)
				.ok_or_else(|| anyhow::anyhow!("no tiles transcoded for format '{format}'"))?;
			blocks.push((format.wire_format(), map));
		}
		if let Some(meta) = meta {
			blocks.push((TileFormat::JSON, meta));
		}

		for (format, map) in &blocks {
			ensure!(
				map.len() as u32 == size * size,
				"format '{format}' holds {} sub-tiles, expected {}",
				map.len(),
				size * size
			);
		}

		// Payloads start after all header blocks.
		let mut offset = (HEADER_SIZE + TABLE_SIZE) * blocks.len() as u64;
		let mut writer = ValueWriterBlob::new();

		for (format, map) in &blocks {
			Self::write_header(&mut writer, coord, *format);
			offset = Self::write_offsets(&mut writer, coord, size, map, offset)?;
		}
		for (_, map) in &blocks {
			for row in 0..size {
				for col in 0..size {
					writer.write_slice(map[&(row, col)].as_slice());
				}
			}
		}

		Ok(writer.into_blob())
	}

	fn write_header(writer: &mut ValueWriterBlob, coord: &MetatileCoord, format: TileFormat) {
		writer.write_slice(MAGIC);
		writer.write_i32((METATILE * METATILE) as i32);
		writer.write_i32(coord.x as i32);
		writer.write_i32(coord.y as i32);
		writer.write_i32(i32::from(coord.z));
		writer.write_i32(format.code() as i32);
	}

	fn write_offsets(
		writer: &mut ValueWriterBlob,
		coord: &MetatileCoord,
		size: u32,
		map: &BTreeMap<(u32, u32), Blob>,
		mut offset: u64,
	) -> Result<u64> {
		let entries = (METATILE * METATILE) as usize;
		let mut table: Vec<Option<(u64, u64)>> = vec![None; entries];
		for row in 0..size {
			for col in 0..size {
				let length = map[&(row, col)].len();
				table[table_index(coord, row, col)] = Some((offset, length));
				offset += length;
			}
		}
		for entry in table {
			let (position, length) = entry.unwrap_or((0, 0));
			writer.write_i32(position as i32);
			writer.write_i32(length as i32);
		}
		Ok(offset)
	}
}
