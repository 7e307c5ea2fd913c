//! Worker configuration: storage endpoint, coverage catalog, styles with
//! their rendering systems, per-style format lists and per-format encoder
//! options.

use anyhow::{Context, Result, anyhow, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tilesmith_core::FormatName;
use tilesmith_render::transcode::FormatOptions;
use tilesmith_render::{FactoryConfig, RegionSpec, StyleSpec, StyleSystem};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
	pub url: String,
	pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoveragesSection {
	/// Catalog file of coverage datasets (YAML with WKT polygons).
	pub catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSection {
	pub styles: Vec<String>,
	#[serde(default)]
	pub saved_styles: Vec<String>,
	#[serde(default)]
	pub read_only_styles: Vec<String>,
	pub memory_limit_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
	pub name: String,
	pub style: String,
	/// File holding the region's WKT mask.
	pub mask_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "system", rename_all = "lowercase")]
pub enum StyleConfig {
	Vector {
		default_style: String,
		mask_style: Option<String>,
		#[serde(default)]
		regions: Vec<RegionConfig>,
	},
	Terrain {
		host: String,
		port: u16,
	},
	Aerial {
		url: String,
		#[serde(default = "default_concurrency")]
		concurrency: usize,
	},
	Composite {
		layers: Vec<String>,
		/// `r,g,b,a` decimal components.
		background: Option<String>,
	},
	Coverages {
		vendors: HashMap<String, String>,
	},
	Mapsource {
		search_url: String,
		styles: Vec<String>,
	},
}

fn default_concurrency() -> usize {
	16
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
	pub storage: StorageSection,
	#[serde(default)]
	pub coverages: CoveragesSection,
	pub worker: WorkerSection,
	/// Style name → format names (`png`, `png256`, `jpeg`, `gif`, `json`).
	pub formats: HashMap<String, Vec<String>>,
	#[serde(default)]
	pub format_options: HashMap<String, FormatOptions>,
	pub styles: HashMap<String, StyleConfig>,
}

impl WorkerConfig {
	pub fn from_path(path: &Path) -> Result<WorkerConfig> {
		let file = File::open(path).with_context(|| format!("opening config {path:?}"))?;
		let config: WorkerConfig = serde_yaml_ng::from_reader(BufReader::new(file))
			.with_context(|| format!("parsing config {path:?}"))?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_string(text: &str) -> Result<WorkerConfig> {
		let config: WorkerConfig = serde_yaml_ng::from_str(text).context("parsing config")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		for style in &self.worker.styles {
			ensure!(
				self.styles.contains_key(style) || self.worker.read_only_styles.contains(style),
				"style '{style}' is listed but has no configuration"
			);
			ensure!(
				self.formats.contains_key(style),
				"style '{style}' has no formats configured"
			);
		}
		Ok(())
	}

	/// Resolves the serde-level config into the factory's description.
	pub fn to_factory_config(&self) -> Result<FactoryConfig> {
		let mut styles = Vec::new();
		for name in &self.worker.styles {
			let system = if let Some(config) = self.styles.get(name) {
				config.to_system()?
			} else {
				// read-only styles need no system; use a placeholder that
				// the factory never constructs
				StyleSystem::Composite { layers: Vec::new(), background: None }
			};
			styles.push(StyleSpec { name: name.clone(), system });
		}

		let mut formats = HashMap::new();
		for (style, names) in &self.formats {
			let parsed = names
				.iter()
				.map(|n| FormatName::parse(n))
				.collect::<Result<Vec<_>>>()
				.with_context(|| format!("formats of style '{style}'"))?;
			formats.insert(style.clone(), parsed);
		}

		let mut format_options = HashMap::new();
		for (name, options) in &self.format_options {
			format_options.insert(FormatName::parse(name)?, options.clone());
		}

		Ok(FactoryConfig {
			styles,
			saved_styles: self.worker.saved_styles.clone(),
			read_only_styles: self.worker.read_only_styles.clone(),
			formats,
			format_options,
		})
	}
}

impl StyleConfig {
	fn to_system(&self) -> Result<StyleSystem> {
		Ok(match self {
			StyleConfig::Vector {
				default_style,
				mask_style,
				regions,
			} => StyleSystem::Vector {
				default_style: default_style.clone(),
				mask_style: mask_style.clone(),
				regions: regions
					.iter()
					.map(|region| {
						let mask_wkt = std::fs::read_to_string(&region.mask_file)
							.with_context(|| format!("reading mask {:?}", region.mask_file))?;
						Ok(RegionSpec {
							name: region.name.clone(),
							style: region.style.clone(),
							mask_wkt,
						})
					})
					.collect::<Result<Vec<_>>>()?,
			},
			StyleConfig::Terrain { host, port } => StyleSystem::Terrain {
				host: host.clone(),
				port: *port,
			},
			StyleConfig::Aerial { url, concurrency } => StyleSystem::Aerial {
				url: url.clone(),
				concurrency: *concurrency,
			},
			StyleConfig::Composite { layers, background } => StyleSystem::Composite {
				layers: layers.clone(),
				background: background.as_deref().map(parse_background).transpose()?,
			},
			StyleConfig::Coverages { vendors } => StyleSystem::Coverages {
				vendors: vendors.clone(),
			},
			StyleConfig::Mapsource { search_url, styles } => StyleSystem::Mapsource {
				search_url: search_url.clone(),
				styles: styles.clone(),
			},
		})
	}
}

fn parse_background(text: &str) -> Result<[u8; 4]> {
	let parts = text
		.split(',')
		.map(|part| part.trim().parse::<u8>().map_err(|e| anyhow!("{e}")))
		.collect::<Result<Vec<u8>>>()
		.with_context(|| format!("parsing background color '{text}'"))?;
	ensure!(parts.len() == 4, "background color '{text}' needs r,g,b,a");
	Ok([parts[0], parts[1], parts[2], parts[3]])
}

/// Where to reach the job broker.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
	pub address: String,
}

impl QueueConfig {
	pub fn from_path(path: &Path) -> Result<QueueConfig> {
		let file = File::open(path).with_context(|| format!("opening queue config {path:?}"))?;
		serde_yaml_ng::from_reader(BufReader::new(file))
			.with_context(|| format!("parsing queue config {path:?}"))
	}
}
