//! The renderer-facing view of a job: the metatile anchor with its
//! geographic bounds, pixel dimensions and coverage scale.

use anyhow::Result;
use std::sync::Arc;
use tilesmith_core::{
	GeoBBox, Job, LatLng, Mercator, MetatileCoord, TILE_SIZE, TileCoord, scale_denominator,
};

#[derive(Clone)]
pub struct RenderTile {
	pub style: String,
	/// Metatile anchor (x and y are multiples of 8 above z 3).
	pub x: u32,
	pub y: u32,
	pub z: u8,
	pub bbox: GeoBBox,
	pub center: LatLng,
	/// Edge length in pixels; tiles are square.
	pub pixels: u32,
	/// Sub-tile rows/columns covered.
	pub dimensions: u32,
	pub scale: u64,
	projection: Arc<Mercator>,
}

impl RenderTile {
	/// Builds the render tile for a job's *metatile*, not its sub-tile.
	pub fn from_job(job: &Job, projection: Arc<Mercator>) -> Result<RenderTile> {
		let meta = job.metatile();
		Self::from_metatile(&job.style, &meta, projection)
	}

	pub fn from_metatile(
		style: &str,
		meta: &MetatileCoord,
		projection: Arc<Mercator>,
	) -> Result<RenderTile> {
		let size = meta.size();
		let (bbox, center) = projection.block_bounds(meta.x, meta.y, meta.z, size)?;
		Ok(RenderTile {
			style: style.to_string(),
			x: meta.x,
			y: meta.y,
			z: meta.z,
			bbox,
			center,
			pixels: size * TILE_SIZE,
			dimensions: size,
			scale: scale_denominator(meta.z),
			projection,
		})
	}

	pub fn coord(&self) -> MetatileCoord {
		MetatileCoord {
			x: self.x,
			y: self.y,
			z: self.z,
		}
	}

	/// The same tile re-targeted at another style, for combinators that
	/// delegate to sibling styles.
	pub fn with_style(&self, style: &str) -> RenderTile {
		let mut tile = self.clone();
		tile.style = style.to_string();
		tile
	}

	/// A single sub-tile of this metatile, `None` outside the dimensions.
	pub fn sub_tile(&self, row: u32, col: u32) -> Option<RenderTile> {
		if row >= self.dimensions || col >= self.dimensions {
			return None;
		}
		let x = self.x + col;
		let y = self.y + row;
		let (bbox, center) = self.projection.block_bounds(x, y, self.z, 1).ok()?;
		Some(RenderTile {
			style: self.style.clone(),
			x,
			y,
			z: self.z,
			bbox,
			center,
			pixels: TILE_SIZE,
			dimensions: 1,
			scale: self.scale,
			projection: self.projection.clone(),
		})
	}

	pub fn sub_tile_coord(&self, row: u32, col: u32) -> TileCoord {
		TileCoord {
			x: self.x + col,
			y: self.y + row,
			z: self.z,
		}
	}
}

impl std::fmt::Debug for RenderTile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"RenderTile(style:{} {}:{}:{} {}px {}x{} scale:{})",
			self.style, self.z, self.x, self.y, self.pixels, self.dimensions, self.dimensions, self.scale
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tilesmith_core::JobStatus;

	fn job(z: u8, x: u32, y: u32) -> Job {
		Job {
			gid: 1,
			clientid: String::new(),
			priority: 0,
			status: JobStatus::Render,
			style: "map".to_string(),
			z,
			x,
			y,
			data: None,
			last_modified: 0,
		}
	}

	#[test]
	fn anchors_and_sizes() {
		let projection = Arc::new(Mercator::new(31));
		let tile = RenderTile::from_job(&job(15, 19294, 24642), projection).unwrap();
		assert_eq!((tile.x, tile.y), (19288, 24640));
		assert_eq!(tile.dimensions, 8);
		assert_eq!(tile.pixels, 2048);
	}

	#[test]
	fn sub_tiles_stay_in_bounds() {
		let projection = Arc::new(Mercator::new(31));
		let tile = RenderTile::from_job(&job(1, 0, 0), projection).unwrap();
		assert_eq!(tile.dimensions, 2);
		assert!(tile.sub_tile(1, 1).is_some());
		assert!(tile.sub_tile(2, 0).is_none());

		let sub = tile.sub_tile(1, 0).unwrap();
		assert_eq!((sub.x, sub.y), (0, 1));
		assert_eq!(sub.pixels, 256);
		assert!(sub.bbox.north <= tile.bbox.north + 1e-9);
	}

	#[test]
	fn bbox_shrinks_with_zoom() {
		let projection = Arc::new(Mercator::new(31));
		let world = RenderTile::from_job(&job(0, 0, 0), projection.clone()).unwrap();
		let city = RenderTile::from_job(&job(15, 19294, 24642), projection).unwrap();
		assert!(world.bbox.east - world.bbox.west > city.bbox.east - city.bbox.west);
	}
}
