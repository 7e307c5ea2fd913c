//! Dispatches a metatile across vendors: every sub-tile asks the coverage
//! index which vendor's data applies, vendor names map to sibling styles,
//! and mixed metatiles are assembled sub-tile by sub-tile from the
//! competing renders.

use crate::coverage::CoverageIndex;
use crate::factory::RendererRegistry;
use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::Renderer;
use anyhow::{Result, anyhow, bail, ensure};
use async_trait::async_trait;
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub struct CoverageRenderer {
	/// vendor name (lowercase) → sub-style name; must hold `default` and
	/// `missing` entries.
	vendors: HashMap<String, String>,
	registry: Arc<RendererRegistry>,
	index: Arc<CoverageIndex>,
}

impl CoverageRenderer {
	pub fn new(
		vendors: HashMap<String, String>,
		registry: Arc<RendererRegistry>,
		index: Arc<CoverageIndex>,
	) -> Result<CoverageRenderer> {
		ensure!(vendors.contains_key("default"), "required config 'default' not found");
		ensure!(vendors.contains_key("missing"), "required config 'missing' not found");
		Ok(CoverageRenderer { vendors, registry, index })
	}

	/// Vendor names nobody configured fall back to the `missing` style.
	fn style_for_vendor(&self, vendor: &str) -> &str {
		self
			.vendors
			.get(vendor)
			.unwrap_or_else(|| &self.vendors["missing"])
	}

	/// Assigns each sub-tile to a sub-style and returns the distinct
	/// sub-styles in first-use order plus the per-sub-tile assignment.
	fn assign(
		&self,
		tile: &RenderTile,
		names: &BTreeMap<(u32, u32), Vec<String>>,
	) -> (Vec<String>, BTreeMap<(u32, u32), usize>) {
		let mut styles: Vec<String> = Vec::new();
		let mut assignment = BTreeMap::new();

		for (position, sub_names) in names {
			// sub-tiles with no coverage at all use the default style
			let vendor = match sub_names.first() {
				Some(name) => name.to_lowercase(),
				None => {
					warn!(
						"no coverage for style '{}' at sub tile z={} x={} y={}",
						tile.style,
						tile.z,
						tile.x + position.1,
						tile.y + position.0
					);
					"default".to_string()
				}
			};
			let style = self.style_for_vendor(&vendor).to_string();
			let index = match styles.iter().position(|s| *s == style) {
				Some(index) => index,
				None => {
					styles.push(style);
					styles.len() - 1
				}
			};
			assignment.insert(*position, index);
		}

		(styles, assignment)
	}
}

#[async_trait]
impl Renderer for CoverageRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let coverage = self.index.check_sub_tiles(tile);
		let (styles, assignment) = self.assign(tile, &coverage.names);

		if styles.len() > 1 {
			info!(
				"mixed coverage {:?} for style '{}' at metatile z={} x={} y={}",
				coverage.unique, tile.style, tile.z, tile.x, tile.y
			);
		}

		let mut renderers = Vec::with_capacity(styles.len());
		for style in &styles {
			renderers.push(
				self
					.registry
					.renderer_for(style)
					.ok_or_else(|| anyhow!("renderer for style '{style}' could not be retrieved"))?,
			);
		}

		if renderers.len() == 1 {
			let result = renderers[0].process(tile).await?;
			ensure!(
				result.is_some(),
				"no image rendered for coverage(s) {:?}",
				coverage.unique
			);
			return Ok(result);
		}

		// Mixed coverage: render each sub-style over the whole metatile,
		// then pick per sub-tile.
		let mut results = Vec::with_capacity(renderers.len());
		for renderer in &renderers {
			match renderer.process(tile).await? {
				Some(result) => results.push(result),
				None => bail!("no image rendered for coverage(s) {:?}", coverage.unique),
			}
		}

		let mut data = BTreeMap::new();
		let mut meta = BTreeMap::new();
		for (position, index) in &assignment {
			let winner = &results[*index];
			let image = winner
				.data
				.get(position)
				.ok_or_else(|| anyhow!("sub-style result is missing sub-tile {position:?}"))?;
			data.insert(*position, image.clone());
			meta.insert(*position, winner.meta_or_empty(*position));
		}

		Ok(Some(RenderResult::new(data, Some(meta))))
	}
}
