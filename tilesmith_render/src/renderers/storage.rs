//! Storage-fronted renderer: a facade that answers from the tile store
//! when it can and only delegates to the wrapped renderer on a miss,
//! writing the fresh result back. With no wrapped renderer it serves a
//! read-only style.

use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::Renderer;
use crate::transcode::{FormatOptions, transcode, transcode_meta};
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use geojson::FeatureCollection;
use log::error;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tilesmith_container::{MetatileReader, MetatileWriter, StorageClient};
use tilesmith_core::{Blob, FormatName};

pub struct StorageRenderer {
	storage: Arc<StorageClient>,
	inner: Option<Arc<dyn Renderer>>,
	formats: Vec<FormatName>,
	format_options: HashMap<FormatName, FormatOptions>,
}

impl StorageRenderer {
	/// A leaf that only ever reads from storage.
	pub fn read_only(storage: Arc<StorageClient>) -> StorageRenderer {
		StorageRenderer {
			storage,
			inner: None,
			formats: Vec::new(),
			format_options: HashMap::new(),
		}
	}

	/// A decorator that writes the inner renderer's results back.
	pub fn saving(
		storage: Arc<StorageClient>,
		inner: Arc<dyn Renderer>,
		formats: Vec<FormatName>,
		format_options: HashMap<FormatName, FormatOptions>,
	) -> StorageRenderer {
		StorageRenderer {
			storage,
			inner: Some(inner),
			formats,
			format_options,
		}
	}

	fn unpack(blob: Blob, tile: &RenderTile) -> Result<RenderResult> {
		let reader = MetatileReader::new(blob);

		let mut data = BTreeMap::new();
		if let Some(set) = reader.image_set() {
			for row in 0..tile.dimensions {
				for col in 0..tile.dimensions {
					if let Some(bytes) = reader.tile(set, row, col) {
						let image = image::load_from_memory(bytes)
							.with_context(|| format!("decoding stored sub-tile ({row},{col})"))?
							.to_rgba8();
						data.insert((row, col), image);
					}
				}
			}
		}
		ensure!(!data.is_empty(), "stored metatile held no image tiles");

		let meta = match reader.json_set() {
			Some(set) => {
				let mut collections = BTreeMap::new();
				for row in 0..tile.dimensions {
					for col in 0..tile.dimensions {
						if let Some(bytes) = reader.tile(set, row, col) {
							let collection: FeatureCollection = serde_json::from_slice(bytes)
								.with_context(|| format!("parsing stored metadata ({row},{col})"))?;
							collections.insert((row, col), collection);
						}
					}
				}
				Some(collections)
			}
			None => None,
		};

		Ok(RenderResult::new(data, meta))
	}

	async fn save(&self, tile: &RenderTile, result: &RenderResult) -> Result<()> {
		let image_formats: Vec<FormatName> = self
			.formats
			.iter()
			.copied()
			.filter(|f| *f != FormatName::Json)
			.collect();
		let tiles = transcode(result, tile.dimensions, &image_formats, &self.format_options)?;
		let meta = if self.formats.contains(&FormatName::Json) {
			transcode_meta(result)?
		} else {
			None
		};
		let blob = MetatileWriter::write(
			&tile.coord(),
			tile.dimensions,
			&image_formats,
			&tiles,
			meta.as_ref(),
		)?;
		self
			.storage
			.put_meta(&tile.style, &tile.coord(), &blob, None)
			.await
	}
}

#[async_trait]
impl Renderer for StorageRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let stored = self.storage.get_meta(&tile.style, &tile.coord()).await?;
		if let Some(handle) = stored {
			if !handle.expired() {
				return Ok(Some(Self::unpack(handle.blob, tile)?));
			}
		}

		let Some(inner) = &self.inner else {
			// read-only style, nothing in storage
			return Ok(None);
		};

		let Some(result) = inner.process(tile).await? else {
			return Ok(None);
		};

		// A storage failure is logged, not fatal: the result still flows
		// back through the broker.
		if let Err(e) = self.save(tile, &result).await {
			error!(
				"failed to save metatile ({}:{}:{}:{}): {e:#}",
				tile.z, tile.x, tile.y, tile.style
			);
		}

		Ok(Some(result))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::solid_tile;
	use image::{ImageEncoder, RgbaImage};
	use tilesmith_core::MetatileCoord;

	fn packed_metatile(coord: &MetatileCoord, size: u32) -> Blob {
		let mut pngs = BTreeMap::new();
		for row in 0..size {
			for col in 0..size {
				let image = RgbaImage::from_pixel(256, 256, image::Rgba([row as u8, col as u8, 0, 255]));
				let mut buffer = Vec::new();
				image::codecs::png::PngEncoder::new(&mut buffer)
					.write_image(image.as_raw(), 256, 256, image::ExtendedColorType::Rgba8)
					.unwrap();
				pngs.insert((row, col), Blob::from(buffer));
			}
		}
		let tiles = BTreeMap::from([(FormatName::Png, pngs)]);
		MetatileWriter::write(coord, size, &[FormatName::Png], &tiles, None).unwrap()
	}

	#[test]
	fn unpack_restores_sub_tiles() {
		let tile = solid_tile(1, 0, 0);
		let blob = packed_metatile(&tile.coord(), tile.dimensions);
		let result = StorageRenderer::unpack(blob, &tile).unwrap();
		assert_eq!(result.data.len(), 4);
		assert_eq!(result.data[&(1, 0)].get_pixel(0, 0).0[0], 1);
		assert!(result.meta.is_none());
	}

	#[test]
	fn unpack_rejects_empty_containers() {
		let tile = solid_tile(1, 0, 0);
		assert!(StorageRenderer::unpack(Blob::from("not a metatile"), &tile).is_err());
	}
}
