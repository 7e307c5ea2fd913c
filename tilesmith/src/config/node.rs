//! Storage node configuration: the tile tree on disk, the versions served,
//! and the expiry/stats companion services.

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tilesmith_core::{MAX_EXPIRY_Z, MAX_ZOOM};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpiryConfig {
	pub host: String,
	pub port: u16,
	#[serde(default = "default_max_z")]
	pub max_z: u8,
	/// Directory of per-style bit files (expiry server only).
	pub directory: Option<PathBuf>,
}

fn default_max_z() -> u8 {
	MAX_ZOOM
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
	pub host: String,
	pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
	/// Root of the tile directory tree.
	pub root: PathBuf,
	pub bind: String,
	/// Versions this node serves; anything else is not found.
	pub versions: Vec<String>,
	pub expiry: ExpiryConfig,
	pub stats: StatsConfig,
}

impl NodeConfig {
	pub fn from_path(path: &Path) -> Result<NodeConfig> {
		let file = File::open(path).with_context(|| format!("opening config {path:?}"))?;
		let config: NodeConfig = serde_yaml_ng::from_reader(BufReader::new(file))
			.with_context(|| format!("parsing config {path:?}"))?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_string(text: &str) -> Result<NodeConfig> {
		let config: NodeConfig = serde_yaml_ng::from_str(text).context("parsing config")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		ensure!(!self.versions.is_empty(), "at least one version must be served");
		ensure!(
			self.expiry.max_z <= MAX_EXPIRY_Z,
			"expiry max_z {} exceeds the index limit {MAX_EXPIRY_Z}",
			self.expiry.max_z
		);
		Ok(())
	}
}
