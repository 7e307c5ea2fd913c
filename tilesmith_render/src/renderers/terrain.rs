//! Fetches one metatile-sized PNG from the terrain service. The service
//! ignores the requested file format and always answers PNG; a non-200
//! status or a literal `No tile found` body means there is no terrain
//! here, which is a normal outcome.

use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::Renderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::error;

const NO_TILE_BODY: &[u8] = b"No tile found";

pub struct TerrainRenderer {
	host: String,
	port: u16,
	client: reqwest::Client,
}

impl TerrainRenderer {
	pub fn new(host: &str, port: u16) -> TerrainRenderer {
		TerrainRenderer {
			host: host.to_string(),
			port,
			client: reqwest::Client::new(),
		}
	}

	fn url(&self, tile: &RenderTile) -> String {
		format!(
			"http://{}:{}/ter/{}/{}/{}.png",
			self.host, self.port, tile.z, tile.x, tile.y
		)
	}
}

#[async_trait]
impl Renderer for TerrainRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let url = self.url(tile);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.with_context(|| format!("fetching terrain {url}"))?;

		if !response.status().is_success() {
			error!("terrain source answered {} for {url}", response.status());
			return Ok(None);
		}
		let bytes = response.bytes().await.with_context(|| format!("reading {url}"))?;
		if bytes.is_empty() || bytes.as_ref() == NO_TILE_BODY {
			return Ok(None);
		}

		let Ok(image) = image::load_from_memory(&bytes) else {
			// places without terrain come back as unparsable bodies
			return Ok(None);
		};

		Ok(Some(RenderResult::from_image(tile, &image.to_rgba8(), None)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::solid_tile;

	#[test]
	fn urls_address_the_metatile_anchor() {
		let renderer = TerrainRenderer::new("terrain.example", 5005);
		let tile = solid_tile(15, 19294, 24642);
		assert_eq!(
			renderer.url(&tile),
			"http://terrain.example:5005/ter/15/19288/24640.png"
		);
	}
}
