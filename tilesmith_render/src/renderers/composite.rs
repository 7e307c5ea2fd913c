//! Layers several sibling styles on top of each other, bottom first, with
//! an optional solid background underneath everything.

use super::blend::over;
use crate::factory::RendererRegistry;
use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::Renderer;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use geojson::FeatureCollection;
use image::{Rgba, RgbaImage};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tilesmith_core::TILE_SIZE;

pub struct CompositeRenderer {
	layers: Vec<String>,
	registry: Arc<RendererRegistry>,
	background: Option<Rgba<u8>>,
}

impl CompositeRenderer {
	pub fn new(
		layers: Vec<String>,
		registry: Arc<RendererRegistry>,
		background: Option<[u8; 4]>,
	) -> CompositeRenderer {
		CompositeRenderer {
			layers,
			registry,
			background: background.map(Rgba),
		}
	}
}

#[async_trait]
impl Renderer for CompositeRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let mut results = Vec::new();
		for layer in &self.layers {
			let renderer = self
				.registry
				.renderer_for(layer)
				.ok_or_else(|| anyhow!("composite layer '{layer}' is not configured"))?;
			if let Some(result) = renderer.process(&tile.with_style(layer)).await? {
				results.push(result);
			}
		}
		if results.is_empty() {
			bail!("no composite layer could be rendered for {tile:?}");
		}

		let positions: BTreeSet<(u32, u32)> =
			results.iter().flat_map(|r| r.data.keys().copied()).collect();

		let mut data = BTreeMap::new();
		let mut meta = BTreeMap::new();
		for position in positions {
			let mut stack: Option<RgbaImage> = self
				.background
				.map(|color| RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, color));
			let mut features = Vec::new();

			for result in &results {
				let Some(layer_image) = result.data.get(&position) else {
					continue;
				};
				stack = Some(match stack {
					Some(lower) => over(&lower, layer_image),
					None => layer_image.clone(),
				});
				if let Some(layer_meta) = &result.meta {
					if let Some(collection) = layer_meta.get(&position) {
						features.extend(collection.features.iter().cloned());
					}
				}
			}

			if let Some(image) = stack {
				data.insert(position, image);
				meta.insert(
					position,
					FeatureCollection {
						bbox: None,
						features,
						foreign_members: None,
					},
				);
			}
		}

		Ok(Some(RenderResult::new(data, Some(meta))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory::RendererRegistry;
	use crate::testing::{SolidRenderer, solid_tile};

	fn registry_with(layers: &[(&str, Rgba<u8>)]) -> Arc<RendererRegistry> {
		let registry = Arc::new(RendererRegistry::new());
		let map = layers
			.iter()
			.map(|(name, color)| {
				(
					name.to_string(),
					Arc::new(SolidRenderer::new(*color)) as Arc<dyn Renderer>,
				)
			})
			.collect();
		registry.install(map);
		registry
	}

	#[tokio::test]
	async fn opaque_top_layer_wins() {
		let registry = registry_with(&[
			("base", Rgba([255, 0, 0, 255])),
			("top", Rgba([0, 255, 0, 255])),
		]);
		let composite = CompositeRenderer::new(
			vec!["base".to_string(), "top".to_string()],
			registry,
			None,
		);

		let result = composite
			.process(&solid_tile(1, 0, 0))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(
			result.data[&(0, 0)].get_pixel(0, 0),
			&Rgba([0, 255, 0, 255])
		);
	}

	#[tokio::test]
	async fn translucent_layer_blends_with_background() {
		let registry = registry_with(&[("glass", Rgba([0, 0, 255, 128]))]);
		let composite = CompositeRenderer::new(
			vec!["glass".to_string()],
			registry,
			Some([255, 0, 0, 255]),
		);

		let result = composite
			.process(&solid_tile(1, 0, 0))
			.await
			.unwrap()
			.unwrap();
		let pixel = result.data[&(0, 0)].get_pixel(0, 0);
		assert!((i32::from(pixel.0[0]) - 128).abs() <= 1);
		assert_eq!(pixel.0[1], 0);
		assert!((i32::from(pixel.0[2]) - 128).abs() <= 1);
		assert_eq!(pixel.0[3], 255);
	}

	#[tokio::test]
	async fn unknown_layer_is_an_error() {
		let registry = registry_with(&[("base", Rgba([1, 2, 3, 255]))]);
		let composite = CompositeRenderer::new(vec!["missing".to_string()], registry, None);
		assert!(composite.process(&solid_tile(1, 0, 0)).await.is_err());
	}

	#[tokio::test]
	async fn metadata_concatenates_in_layer_order() {
		let registry = registry_with(&[
			("base", Rgba([255, 0, 0, 255])),
			("top", Rgba([0, 255, 0, 255])),
		]);
		let composite = CompositeRenderer::new(
			vec!["base".to_string(), "top".to_string()],
			registry,
			None,
		);
		let result = composite
			.process(&solid_tile(1, 0, 0))
			.await
			.unwrap()
			.unwrap();
		// solid renderers produce no features; the collection is still
		// explicit for every sub-tile
		let meta = result.meta.unwrap();
		assert_eq!(meta.len(), result.data.len());
		assert!(meta.values().all(|c| c.features.is_empty()));
	}
}
