//! The coverage index answers "which vendor's data applies here?" by
//! testing tile geometry against dataset polygons. Iteration order is the
//! catalog's declaration order, which makes every query deterministic.

use super::dataset::{CoverageDataset, DatasetRecord};
use crate::tile::RenderTile;
use anyhow::{Context, Result};
use geo::{polygon, Contains, Intersects, Point, Polygon, Within};
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tilesmith_core::LatLng;

const PROJECTION: &str = "MERCATOR";

/// Per-sub-tile coverage answer for one metatile.
pub struct SubTileCoverage {
	/// Coverage names per `(row, col)`, possibly empty for a sub-tile.
	pub names: BTreeMap<(u32, u32), Vec<String>>,
	/// Distinct first-hit names across all sub-tiles; `None` marks
	/// sub-tiles that had no coverage at all.
	pub unique: BTreeSet<Option<String>>,
}

#[derive(Deserialize)]
struct Catalog {
	datasets: Vec<DatasetRecord>,
}

pub struct CoverageIndex {
	datasets: Vec<CoverageDataset>,
}

impl CoverageIndex {
	pub fn from_datasets(datasets: Vec<CoverageDataset>) -> CoverageIndex {
		CoverageIndex { datasets }
	}

	/// Loads a catalog file (YAML with WKT polygons).
	pub fn from_catalog(path: &Path) -> Result<CoverageIndex> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("reading coverage catalog {path:?}"))?;
		let catalog: Catalog =
			serde_yaml_ng::from_str(&text).with_context(|| format!("parsing {path:?}"))?;
		let datasets = catalog
			.datasets
			.into_iter()
			.map(CoverageDataset::from_record)
			.collect::<Result<Vec<_>>>()?;
		debug!("loaded {} coverage datasets from {path:?}", datasets.len());
		Ok(CoverageIndex { datasets })
	}

	pub fn datasets(&self) -> &[CoverageDataset] {
		&self.datasets
	}

	/// Datasets valid for a scale under a projection, in declaration order.
	pub fn datasets_for_scale(&self, scale: u64, projection: &str) -> Vec<&CoverageDataset> {
		self
			.datasets
			.iter()
			.filter(|d| d.is_candidate(scale, projection))
			.collect()
	}

	/// Ids of candidate datasets whose polygons match the probe geometry.
	///
	/// With `use_polygon` the probe quad is tested for intersects-or-within
	/// against each dataset polygon; otherwise each corner point is tested
	/// for containment. With `all_matches` false the scan stops at the
	/// first hit.
	pub fn intersecting_datasets(
		&self,
		candidates: &[&CoverageDataset],
		corners: &[LatLng; 4],
		all_matches: bool,
		use_polygon: bool,
	) -> Vec<String> {
		let probe: Polygon<f64> = polygon![
			(x: corners[0].lng, y: corners[0].lat),
			(x: corners[1].lng, y: corners[1].lat),
			(x: corners[2].lng, y: corners[2].lat),
			(x: corners[3].lng, y: corners[3].lat),
		];

		let mut ids: Vec<String> = Vec::new();
		for dataset in candidates {
			for polygon in &dataset.polygons {
				let hit = if use_polygon {
					polygon.intersects(&probe) || polygon.is_within(&probe)
				} else {
					corners
						.iter()
						.any(|corner| polygon.contains(&Point::new(corner.lng, corner.lat)))
				};
				if hit {
					if !all_matches {
						return vec![dataset.id.clone()];
					}
					if !ids.contains(&dataset.id) {
						ids.push(dataset.id.clone());
					}
				}
			}
		}
		ids
	}

	/// Coverage names for one tile, in dataset declaration order.
	pub fn check(&self, tile: &RenderTile, all_matches: bool, use_polygon: bool) -> Vec<String> {
		let candidates = self.datasets_for_scale(tile.scale, PROJECTION);
		let ids = self.intersecting_datasets(
			&candidates,
			&tile.bbox.corners(),
			all_matches,
			use_polygon,
		);
		ids
			.iter()
			.flat_map(|id| {
				self
					.datasets
					.iter()
					.filter(move |d| &d.id == id)
					.map(|d| d.coverage_name().to_string())
			})
			.collect()
	}

	/// Coverage per sub-tile of a metatile, probing each sub-tile's corner
	/// points against every matching dataset.
	pub fn check_sub_tiles(&self, tile: &RenderTile) -> SubTileCoverage {
		let mut names = BTreeMap::new();
		let mut unique = BTreeSet::new();
		for row in 0..tile.dimensions {
			for col in 0..tile.dimensions {
				let sub_names = match tile.sub_tile(row, col) {
					Some(sub) => self.check(&sub, true, false),
					None => Vec::new(),
				};
				unique.insert(sub_names.first().cloned());
				names.insert((row, col), sub_names);
			}
		}
		SubTileCoverage { names, unique }
	}
}
