//! Builds the per-style renderer tree from configuration.
//!
//! One style name resolves to one renderer. Leaves are the primitive
//! renderers; inner nodes (composite, coverage, the storage decorator)
//! resolve sibling styles through a [`RendererRegistry`] lookup table that
//! is installed once after all renderers are constructed — no parent
//! pointers.

use crate::coverage::CoverageIndex;
use crate::renderers::{
	AerialRenderer, CompositeRenderer, CoverageRenderer, MapsourceRenderer, RegionMask,
	StorageRenderer, TerrainRenderer, VectorRenderer,
};
use crate::traits::{Renderer, TilingEngine, VectorEngine};
use crate::transcode::FormatOptions;
use anyhow::{Context, Result, anyhow, ensure};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tilesmith_container::StorageClient;
use tilesmith_core::FormatName;

/// Name → renderer lookup shared by combinators. Installed exactly once,
/// after the whole tree is built.
pub struct RendererRegistry {
	renderers: OnceLock<HashMap<String, Arc<dyn Renderer>>>,
}

impl Default for RendererRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl RendererRegistry {
	pub fn new() -> RendererRegistry {
		RendererRegistry {
			renderers: OnceLock::new(),
		}
	}

	pub fn install(&self, renderers: HashMap<String, Arc<dyn Renderer>>) {
		assert!(
			self.renderers.set(renderers).is_ok(),
			"renderer registry installed twice"
		);
	}

	pub fn renderer_for(&self, style: &str) -> Option<Arc<dyn Renderer>> {
		self.renderers.get()?.get(style).cloned()
	}
}

/// A region of a vector style: a named sub-style applied inside a mask.
#[derive(Debug, Clone)]
pub struct RegionSpec {
	pub name: String,
	pub style: String,
	pub mask_wkt: String,
}

/// Which rendering system backs a style, with its settings.
#[derive(Debug, Clone)]
pub enum StyleSystem {
	Vector {
		default_style: String,
		mask_style: Option<String>,
		regions: Vec<RegionSpec>,
	},
	Terrain {
		host: String,
		port: u16,
	},
	Aerial {
		url: String,
		concurrency: usize,
	},
	Composite {
		layers: Vec<String>,
		background: Option<[u8; 4]>,
	},
	Coverages {
		vendors: HashMap<String, String>,
	},
	Mapsource {
		search_url: String,
		styles: Vec<String>,
	},
}

#[derive(Debug, Clone)]
pub struct StyleSpec {
	pub name: String,
	pub system: StyleSystem,
}

/// Everything the factory needs to know, assembled from configuration.
pub struct FactoryConfig {
	pub styles: Vec<StyleSpec>,
	/// Styles whose results are written back to storage.
	pub saved_styles: Vec<String>,
	/// Styles that only ever read from storage.
	pub read_only_styles: Vec<String>,
	/// Output formats per style.
	pub formats: HashMap<String, Vec<FormatName>>,
	pub format_options: HashMap<FormatName, FormatOptions>,
}

/// External collaborators handed in at construction.
pub struct FactoryDependencies {
	pub storage: Arc<StorageClient>,
	pub coverage: Option<Arc<CoverageIndex>>,
	pub vector_engine: Option<Arc<dyn VectorEngine>>,
	pub tiling_engine: Option<Arc<dyn TilingEngine>>,
}

pub struct RendererFactory {
	registry: Arc<RendererRegistry>,
}

impl RendererFactory {
	pub fn new(config: &FactoryConfig, deps: &FactoryDependencies) -> Result<RendererFactory> {
		let registry = Arc::new(RendererRegistry::new());
		let mut renderers: HashMap<String, Arc<dyn Renderer>> = HashMap::new();

		for spec in &config.styles {
			info!("loading '{}' style", spec.name);
			ensure!(
				!renderers.contains_key(&spec.name),
				"style '{}' is defined twice",
				spec.name
			);

			let style_formats = config
				.formats
				.get(&spec.name)
				.cloned()
				.ok_or_else(|| anyhow!("no formats configured for style '{}'", spec.name))?;

			let renderer: Arc<dyn Renderer> = if config.read_only_styles.contains(&spec.name) {
				Arc::new(StorageRenderer::read_only(deps.storage.clone()))
			} else {
				let inner = Self::create(spec, config, deps, &registry)
					.with_context(|| format!("building renderer for style '{}'", spec.name))?;
				if config.saved_styles.contains(&spec.name) {
					Arc::new(StorageRenderer::saving(
						deps.storage.clone(),
						inner,
						style_formats,
						config.format_options.clone(),
					))
				} else {
					inner
				}
			};

			renderers.insert(spec.name.clone(), renderer);
		}

		registry.install(renderers);
		Ok(RendererFactory { registry })
	}

	fn create(
		spec: &StyleSpec,
		_config: &FactoryConfig,
		deps: &FactoryDependencies,
		registry: &Arc<RendererRegistry>,
	) -> Result<Arc<dyn Renderer>> {
		Ok(match &spec.system {
			StyleSystem::Vector {
				default_style,
				mask_style,
				regions,
			} => {
				let engine = deps
					.vector_engine
					.clone()
					.ok_or_else(|| anyhow!("no vector engine wired"))?;
				// regions only make sense with a mask style to cut against
				ensure!(
					regions.is_empty() || mask_style.is_some(),
					"style '{}' declares regions but no mask_style",
					spec.name
				);
				let masks = regions
					.iter()
					.map(|region| {
						RegionMask::new(&region.name, &region.style, &region.mask_wkt)
							.with_context(|| format!("region '{}'", region.name))
					})
					.collect::<Result<Vec<_>>>()?;
				Arc::new(VectorRenderer::new(
					engine,
					default_style.clone(),
					mask_style.clone(),
					masks,
				))
			}
			StyleSystem::Terrain { host, port } => Arc::new(TerrainRenderer::new(host, *port)),
			StyleSystem::Aerial { url, concurrency } => {
				Arc::new(AerialRenderer::new(url, *concurrency)?)
			}
			StyleSystem::Composite { layers, background } => Arc::new(CompositeRenderer::new(
				layers.clone(),
				registry.clone(),
				*background,
			)),
			StyleSystem::Coverages { vendors } => {
				let index = deps
					.coverage
					.clone()
					.ok_or_else(|| anyhow!("no coverage index loaded"))?;
				Arc::new(CoverageRenderer::new(
					vendors.clone(),
					registry.clone(),
					index,
				)?)
			}
			StyleSystem::Mapsource { search_url, styles } => {
				let engine = deps
					.tiling_engine
					.clone()
					.ok_or_else(|| anyhow!("no tiling engine wired"))?;
				Arc::new(MapsourceRenderer::new(
					engine,
					search_url.clone(),
					styles.clone(),
				))
			}
		})
	}

	pub fn renderer_for(&self, style: &str) -> Option<Arc<dyn Renderer>> {
		self.registry.renderer_for(style)
	}

	pub fn registry(&self) -> Arc<RendererRegistry> {
		self.registry.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn base_config(styles: Vec<StyleSpec>) -> FactoryConfig {
		let formats = styles
			.iter()
			.map(|s| (s.name.clone(), vec![FormatName::Png]))
			.collect();
		FactoryConfig {
			styles,
			saved_styles: Vec::new(),
			read_only_styles: Vec::new(),
			formats,
			format_options: HashMap::new(),
		}
	}

	fn deps() -> FactoryDependencies {
		FactoryDependencies {
			storage: Arc::new(StorageClient::new("http://storage:8080", "v1")),
			coverage: None,
			vector_engine: None,
			tiling_engine: None,
		}
	}

	#[test]
	fn builds_styles_and_resolves_by_name() {
		let config = base_config(vec![
			StyleSpec {
				name: "ter".to_string(),
				system: StyleSystem::Terrain { host: "terrain".to_string(), port: 5005 },
			},
			StyleSpec {
				name: "hyb".to_string(),
				system: StyleSystem::Composite {
					layers: vec!["ter".to_string()],
					background: None,
				},
			},
		]);
		let factory = RendererFactory::new(&config, &deps()).unwrap();
		assert!(factory.renderer_for("ter").is_some());
		assert!(factory.renderer_for("hyb").is_some());
		assert!(factory.renderer_for("nope").is_none());
	}

	#[test]
	fn duplicate_styles_are_rejected() {
		let spec = StyleSpec {
			name: "ter".to_string(),
			system: StyleSystem::Terrain { host: "terrain".to_string(), port: 5005 },
		};
		let config = base_config(vec![spec.clone(), spec]);
		assert!(RendererFactory::new(&config, &deps()).is_err());
	}

	#[test]
	fn vector_without_engine_fails() {
		let config = base_config(vec![StyleSpec {
			name: "map".to_string(),
			system: StyleSystem::Vector {
				default_style: "osm.xml".to_string(),
				mask_style: None,
				regions: Vec::new(),
			},
		}]);
		assert!(RendererFactory::new(&config, &deps()).is_err());
	}

	#[test]
	fn regions_without_mask_are_rejected() {
		let config = base_config(vec![StyleSpec {
			name: "map".to_string(),
			system: StyleSystem::Vector {
				default_style: "osm.xml".to_string(),
				mask_style: None,
				regions: vec![RegionSpec {
					name: "uk".to_string(),
					style: "uk.xml".to_string(),
					mask_wkt: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".to_string(),
				}],
			},
		}]);
		let mut deps = deps();
		deps.vector_engine = Some(Arc::new(crate::testing::FlatVectorEngine::default()));
		assert!(RendererFactory::new(&config, &deps).is_err());
	}

	#[test]
	fn read_only_styles_skip_system_construction() {
		// a vector style with no engine would normally fail; read-only
		// styles never touch the system config
		let mut config = base_config(vec![StyleSpec {
			name: "old".to_string(),
			system: StyleSystem::Vector {
				default_style: "gone.xml".to_string(),
				mask_style: None,
				regions: Vec::new(),
			},
		}]);
		config.read_only_styles = vec!["old".to_string()];
		assert!(RendererFactory::new(&config, &deps()).is_ok());
	}
}
