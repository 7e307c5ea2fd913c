//! Fetches imagery sub-tile by sub-tile from a templated HTTP source and
//! pastes the pieces into one metatile. Any failed sub-fetch aborts the
//! whole metatile; a partially assembled aerial image is worse than none.

use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::Renderer;
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use image::{RgbaImage, imageops};
use tilesmith_core::TILE_SIZE;

pub struct AerialRenderer {
	url: String,
	concurrency: usize,
	client: reqwest::Client,
}

impl AerialRenderer {
	/// `url` is a template with `{z}`, `{x}` and `{y}` placeholders.
	pub fn new(url: &str, concurrency: usize) -> Result<AerialRenderer> {
		for placeholder in ["{z}", "{x}", "{y}"] {
			ensure!(
				url.contains(placeholder),
				"aerial url template '{url}' is missing {placeholder}"
			);
		}
		Ok(AerialRenderer {
			url: url.to_string(),
			concurrency: concurrency.max(1),
			client: reqwest::Client::new(),
		})
	}

	fn sub_tile_url(&self, z: u8, x: u32, y: u32) -> String {
		self
			.url
			.replace("{z}", &z.to_string())
			.replace("{x}", &x.to_string())
			.replace("{y}", &y.to_string())
	}

	async fn fetch(&self, row: u32, col: u32, url: String) -> Result<(u32, u32, RgbaImage)> {
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.with_context(|| format!("fetching aerial sub-tile {url}"))?;
		ensure!(
			response.status().is_success(),
			"aerial source answered {} for {url}",
			response.status()
		);
		let bytes = response.bytes().await.with_context(|| format!("reading {url}"))?;
		let image = image::load_from_memory(&bytes)
			.with_context(|| format!("decoding aerial sub-tile {url}"))?
			.to_rgba8();
		Ok((row, col, image))
	}
}

#[async_trait]
impl Renderer for AerialRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let fetches = tile
			.coord()
			.sub_tiles()
			.map(|(row, col)| {
				let coord = tile.sub_tile_coord(row, col);
				self.fetch(row, col, self.sub_tile_url(coord.z, coord.x, coord.y))
			})
			.collect::<Vec<_>>();

		let sub_tiles: Vec<(u32, u32, RgbaImage)> = stream::iter(fetches)
			.buffer_unordered(self.concurrency)
			.collect::<Vec<_>>()
			.await
			.into_iter()
			.collect::<Result<_>>()?;

		let mut canvas = RgbaImage::new(tile.pixels, tile.pixels);
		for (row, col, sub_tile) in sub_tiles {
			imageops::replace(
				&mut canvas,
				&sub_tile,
				i64::from(col * TILE_SIZE),
				i64::from(row * TILE_SIZE),
			);
		}

		Ok(Some(RenderResult::from_image(tile, &canvas, None)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn template_must_name_all_axes() {
		assert!(AerialRenderer::new("http://sat/{z}/{x}/{y}.jpg", 16).is_ok());
		assert!(AerialRenderer::new("http://sat/{z}/{x}.jpg", 16).is_err());
	}

	#[test]
	fn urls_substitute_coordinates() {
		let renderer = AerialRenderer::new("http://sat/{z}/{x}/{y}.jpg", 16).unwrap();
		assert_eq!(
			renderer.sub_tile_url(15, 19288, 24641),
			"http://sat/15/19288/24641.jpg"
		);
	}
}
