//! The output of one renderer invocation: a 256×256 RGBA raster per
//! sub-tile, plus optional interactive metadata per sub-tile. Both maps
//! share the same keyset; empty collections are explicit.

use crate::meta::cut_features;
use crate::tile::RenderTile;
use anyhow::{Result, ensure};
use geojson::FeatureCollection;
use image::{RgbaImage, imageops};
use std::collections::BTreeMap;
use tilesmith_core::TILE_SIZE;

pub struct RenderResult {
	/// Sub-tile rasters keyed `(row, col)`.
	pub data: BTreeMap<(u32, u32), RgbaImage>,
	/// Per-sub-tile feature collections, when the renderer produced any.
	pub meta: Option<BTreeMap<(u32, u32), FeatureCollection>>,
}

impl RenderResult {
	pub fn new(
		data: BTreeMap<(u32, u32), RgbaImage>,
		meta: Option<BTreeMap<(u32, u32), FeatureCollection>>,
	) -> RenderResult {
		RenderResult { data, meta }
	}

	/// Cuts one metatile-sized raster (and its metadata, in metatile pixel
	/// space) into per-sub-tile pieces.
	pub fn from_image(
		tile: &RenderTile,
		image: &RgbaImage,
		features: Option<&FeatureCollection>,
	) -> Result<RenderResult> {
		ensure!(
			image.width() == tile.pixels && image.height() == tile.pixels,
			"render produced {}x{} pixels, expected {}x{}",
			image.width(),
			image.height(),
			tile.pixels,
			tile.pixels
		);

		let mut data = BTreeMap::new();
		for row in 0..tile.dimensions {
			for col in 0..tile.dimensions {
				let view =
					imageops::crop_imm(image, col * TILE_SIZE, row * TILE_SIZE, TILE_SIZE, TILE_SIZE);
				data.insert((row, col), view.to_image());
			}
		}

		let meta = features.map(|features| {
			cut_features(
				Some(features),
				(tile.pixels, tile.pixels),
				(tile.dimensions, tile.dimensions),
			)
		});

		Ok(RenderResult { data, meta })
	}

	/// Metadata for a sub-tile, or an explicit empty collection.
	pub fn meta_or_empty(&self, position: (u32, u32)) -> FeatureCollection {
		self
			.meta
			.as_ref()
			.and_then(|meta| meta.get(&position).cloned())
			.unwrap_or_else(empty_collection)
	}
}

pub fn empty_collection() -> FeatureCollection {
	FeatureCollection {
		bbox: None,
		features: Vec::new(),
		foreign_members: None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::solid_tile;
	use image::Rgba;
	use std::sync::Arc;
	use tilesmith_core::Mercator;

	#[test]
	fn cuts_a_metatile_raster() {
		let tile = solid_tile(1, 0, 0);
		let mut image = RgbaImage::from_pixel(512, 512, Rgba([10, 20, 30, 255]));
		image.put_pixel(256, 0, Rgba([200, 0, 0, 255]));

		let result = RenderResult::from_image(&tile, &image, None).unwrap();
		assert_eq!(result.data.len(), 4);
		assert_eq!(
			result.data[&(0, 1)].get_pixel(0, 0),
			&Rgba([200, 0, 0, 255])
		);
		assert_eq!(
			result.data[&(1, 1)].get_pixel(0, 0),
			&Rgba([10, 20, 30, 255])
		);
		assert!(result.meta.is_none());
	}

	#[test]
	fn rejects_wrong_dimensions() {
		let projection = Arc::new(Mercator::new(31));
		let meta = tilesmith_core::MetatileCoord { x: 0, y: 0, z: 1 };
		let tile = RenderTile::from_metatile("map", &meta, projection).unwrap();
		let image = RgbaImage::new(256, 256);
		assert!(RenderResult::from_image(&tile, &image, None).is_err());
	}
}
