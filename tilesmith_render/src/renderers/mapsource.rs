//! The external map-composition renderer: searches POIs per configured
//! style layer within the metatile's bbox, hands the POIs and style strings
//! to the native tiling service, and turns the returned raw RGBA buffer and
//! POI metadata into a render result.

use crate::meta::{PixelRect, rect_feature};
use crate::result::{RenderResult, empty_collection};
use crate::tile::RenderTile;
use crate::traits::{Renderer, TilingEngine, TilingRequest};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use geojson::FeatureCollection;
use image::RgbaImage;
use log::warn;
use serde_json::Value;
use std::sync::Arc;

pub struct MapsourceRenderer {
	engine: Arc<dyn TilingEngine>,
	/// POI search endpoint with `{west}`, `{south}`, `{east}`, `{north}`
	/// and `{style}` placeholders.
	search_url: String,
	styles: Vec<String>,
	client: reqwest::Client,
}

impl MapsourceRenderer {
	pub fn new(
		engine: Arc<dyn TilingEngine>,
		search_url: String,
		styles: Vec<String>,
	) -> MapsourceRenderer {
		MapsourceRenderer {
			engine,
			search_url,
			styles,
			client: reqwest::Client::new(),
		}
	}

	fn search_url_for(&self, style: &str, tile: &RenderTile) -> String {
		self
			.search_url
			.replace("{style}", style)
			.replace("{west}", &tile.bbox.west.to_string())
			.replace("{south}", &tile.bbox.south.to_string())
			.replace("{east}", &tile.bbox.east.to_string())
			.replace("{north}", &tile.bbox.north.to_string())
	}

	/// Gathers the `pois` arrays of every layer's search response into one
	/// flat list. A layer whose search fails contributes nothing.
	async fn search_pois(&self, tile: &RenderTile) -> Value {
		let mut pois = Vec::new();
		for style in &self.styles {
			let url = self.search_url_for(style, tile);
			match self.fetch_pois(&url).await {
				Ok(mut layer_pois) => pois.append(&mut layer_pois),
				Err(e) => warn!("poi search failed for '{style}': {e:#}"),
			}
		}
		Value::Array(pois)
	}

	async fn fetch_pois(&self, url: &str) -> Result<Vec<Value>> {
		let response = self
			.client
			.get(url)
			.send()
			.await
			.with_context(|| format!("searching {url}"))?;
		let body: Value = response
			.json()
			.await
			.with_context(|| format!("parsing search response from {url}"))?;
		Ok(match body.get("pois") {
			Some(Value::Array(pois)) => pois.clone(),
			_ => Vec::new(),
		})
	}
}

/// Turns the tiler's POI metadata into a feature collection: one feature
/// per POI carrying its label and icon rectangles plus id and name.
pub fn extract_poi_features(metadata: &Value) -> FeatureCollection {
	let mut collection = empty_collection();
	let Some(pois) = metadata.get("pois").and_then(Value::as_array) else {
		return collection;
	};

	for poi in pois {
		let rects: Vec<PixelRect> = ["label", "icon"]
			.iter()
			.filter_map(|key| {
				let rect = poi.get(*key)?;
				Some(PixelRect {
					x0: rect.get("x1")?.as_f64()?,
					y0: rect.get("y1")?.as_f64()?,
					x1: rect.get("x2")?.as_f64()?,
					y1: rect.get("y2")?.as_f64()?,
				})
			})
			.collect();

		let (Some(id), Some(name)) = (
			poi.get("id").and_then(Value::as_u64),
			poi.get("name").and_then(Value::as_str),
		) else {
			warn!("poi metadata entry without id/name: {poi}");
			continue;
		};
		if rects.is_empty() {
			continue;
		}
		collection.features.push(rect_feature(id, name, &rects));
	}

	collection
}

#[async_trait]
impl Renderer for MapsourceRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let pois = self.search_pois(tile).await;

		let response = self
			.engine
			.tile(&TilingRequest {
				styles: self.styles.clone(),
				pois,
				bbox: tile.bbox,
				center: tile.center,
				width: tile.pixels,
				height: tile.pixels,
				scale: tile.scale,
			})
			.await?;

		let image = RgbaImage::from_raw(tile.pixels, tile.pixels, response.rgba)
			.ok_or_else(|| anyhow!("tiling service returned a short RGBA buffer"))?;
		let features = response.metadata.as_ref().map(extract_poi_features);

		Ok(Some(RenderResult::from_image(
			tile,
			&image,
			features.as_ref(),
		)?))
	}
}
