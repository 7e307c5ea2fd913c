//! The vector map renderer: a polygon-masked default style plus zero or
//! more named region styles. Where a region mask fully contains the
//! metatile, only that region's style is drawn; where it merely intersects,
//! the default style is rendered with the region cut out and the region
//! style blended in underneath.

use super::blend::{dest_out, over};
use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::{Renderer, VectorEngine};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use geo::{Geometry, Relate};
use geojson::FeatureCollection;
use log::info;
use std::sync::Arc;
use tilesmith_core::GeoBBox;
use wkt::TryFromWkt;

/// A region style with its prepared mask geometry.
pub struct RegionMask {
	pub name: String,
	pub style: String,
	mask: Geometry<f64>,
}

impl RegionMask {
	pub fn new(name: &str, style: &str, mask_wkt: &str) -> Result<RegionMask> {
		let mask = Geometry::try_from_wkt_str(mask_wkt)
			.map_err(|e| anyhow!("{e}"))
			.with_context(|| format!("parsing mask for region '{name}'"))?;
		Ok(RegionMask {
			name: name.to_string(),
			style: style.to_string(),
			mask,
		})
	}

	/// How the mask relates to a bounding box: `(intersects, contains)`.
	pub fn relate(&self, bbox: &GeoBBox) -> (bool, bool) {
		let probe: geo::Polygon<f64> = geo::Rect::new(
			geo::coord! { x: bbox.west, y: bbox.south },
			geo::coord! { x: bbox.east, y: bbox.north },
		)
		.to_polygon();
		let matrix = self.mask.relate(&probe);
		(matrix.is_intersects(), matrix.is_contains())
	}
}

pub struct VectorRenderer {
	engine: Arc<dyn VectorEngine>,
	default_style: String,
	mask_style: Option<String>,
	regions: Vec<RegionMask>,
}

impl VectorRenderer {
	pub fn new(
		engine: Arc<dyn VectorEngine>,
		default_style: String,
		mask_style: Option<String>,
		regions: Vec<RegionMask>,
	) -> VectorRenderer {
		VectorRenderer {
			engine,
			default_style,
			mask_style,
			regions,
		}
	}

	fn matching_region(&self, bbox: &GeoBBox) -> Option<(&RegionMask, bool)> {
		for region in &self.regions {
			let (intersects, contains) = region.relate(bbox);
			if intersects {
				return Some((region, contains));
			}
		}
		None
	}

	fn merge_features(
		a: Option<FeatureCollection>,
		b: Option<FeatureCollection>,
	) -> Option<FeatureCollection> {
		match (a, b) {
			(Some(mut a), Some(b)) => {
				a.features.extend(b.features);
				Some(a)
			}
			(Some(a), None) => Some(a),
			(None, b) => b,
		}
	}
}

#[async_trait]
impl Renderer for VectorRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let size = tile.pixels;
		let (image, features) = match self.matching_region(&tile.bbox) {
			Some((region, true)) => {
				// the region covers the whole metatile
				let rendering = self
					.engine
					.render(&region.style, &tile.bbox, size, size)
					.await?;
				(rendering.image, rendering.features)
			}
			Some((region, false)) => {
				info!("composite map: {}", region.name);
				let mask_style = self
					.mask_style
					.as_ref()
					.ok_or_else(|| anyhow!("region '{}' matched but no mask_style is set", region.name))?;

				let mask = self.engine.render(mask_style, &tile.bbox, size, size).await?;
				let mut default = self
					.engine
					.render(&self.default_style, &tile.bbox, size, size)
					.await?;

				// cut the region out of the default style
				dest_out(&mut default.image, &mask.image);

				let region_rendering = self
					.engine
					.render(&region.style, &tile.bbox, size, size)
					.await?;

				// the default shows everywhere outside the hole; the region
				// style fills the hole from below
				let image = over(&region_rendering.image, &default.image);
				let features = Self::merge_features(default.features, region_rendering.features);
				(image, features)
			}
			None => {
				let rendering = self
					.engine
					.render(&self.default_style, &tile.bbox, size, size)
					.await?;
				(rendering.image, rendering.features)
			}
		};

		Ok(Some(RenderResult::from_image(
			tile,
			&image,
			features.as_ref(),
		)?))
	}
}
