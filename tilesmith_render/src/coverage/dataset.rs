//! One vendor dataset: its polygons, scale ranges and attribution.

use anyhow::{Context, Result};
use geo::Polygon;
use serde::Deserialize;
use std::collections::HashMap;
use tilesmith_core::GeoBBox;
use wkt::TryFromWkt;

/// An inclusive scale-denominator range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScaleRange {
	pub lo: u64,
	pub hi: u64,
}

impl ScaleRange {
	pub fn contains(&self, scale: u64) -> bool {
		self.lo <= scale && scale <= self.hi
	}
}

/// As stored in the coverage catalog; polygons are WKT in lon/lat order.
#[derive(Debug, Deserialize)]
pub struct DatasetRecord {
	pub id: String,
	pub name: String,
	pub vendor_name: String,
	#[serde(default)]
	pub coverage_name: Option<String>,
	#[serde(default)]
	pub copyright_text: Option<String>,
	#[serde(default)]
	pub copyright_html: Option<String>,
	/// `[west, south, east, north]`
	pub bounds: [f64; 4],
	pub scale: ScaleRange,
	#[serde(default)]
	pub projection_scales: HashMap<String, ScaleRange>,
	pub polygons: Vec<String>,
}

pub struct CoverageDataset {
	pub id: String,
	pub name: String,
	pub vendor_name: String,
	pub coverage_name: Option<String>,
	pub copyright_text: Option<String>,
	pub copyright_html: Option<String>,
	pub bounds: GeoBBox,
	pub scale: ScaleRange,
	pub projection_scales: HashMap<String, ScaleRange>,
	pub polygons: Vec<Polygon<f64>>,
}

impl CoverageDataset {
	pub fn from_record(record: DatasetRecord) -> Result<CoverageDataset> {
		let mut polygons = Vec::with_capacity(record.polygons.len());
		for text in &record.polygons {
			let polygon = Polygon::<f64>::try_from_wkt_str(text)
				.map_err(|e| anyhow::anyhow!("{e}"))
				.with_context(|| format!("parsing coverage polygon for dataset '{}'", record.id))?;
			polygons.push(polygon);
		}
		Ok(CoverageDataset {
			id: record.id,
			name: record.name,
			vendor_name: record.vendor_name,
			coverage_name: record.coverage_name,
			copyright_text: record.copyright_text,
			copyright_html: record.copyright_html,
			bounds: GeoBBox::new(
				record.bounds[0],
				record.bounds[1],
				record.bounds[2],
				record.bounds[3],
			),
			scale: record.scale,
			projection_scales: record.projection_scales,
			polygons,
		})
	}

	/// The name reported to coverage consumers; falls back to the vendor.
	pub fn coverage_name(&self) -> &str {
		self.coverage_name.as_deref().unwrap_or(&self.vendor_name)
	}

	/// A dataset is a candidate for a scale under a projection iff the
	/// scale falls in that projection's range, or in the
	/// projection-agnostic range when the projection is absent.
	pub fn is_candidate(&self, scale: u64, projection: &str) -> bool {
		match self.projection_scales.get(projection) {
			Some(range) => range.contains(scale),
			None => self.scale.contains(scale),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record() -> DatasetRecord {
		DatasetRecord {
			id: "nt".to_string(),
			name: "navteq".to_string(),
			vendor_name: "NT".to_string(),
			coverage_name: None,
			copyright_text: Some("© NAVTEQ".to_string()),
			copyright_html: None,
			bounds: [-180.0, -90.0, 180.0, 90.0],
			scale: ScaleRange { lo: 0, hi: 100_000_000 },
			projection_scales: HashMap::from([(
				"MERCATOR".to_string(),
				ScaleRange { lo: 1_000, hi: 50_000_000 },
			)]),
			polygons: vec!["POLYGON((-10 -10, 10 -10, 10 10, -10 10, -10 -10))".to_string()],
		}
	}

	#[test]
	fn parses_wkt_polygons() {
		let dataset = CoverageDataset::from_record(record()).unwrap();
		assert_eq!(dataset.polygons.len(), 1);
		assert_eq!(dataset.coverage_name(), "NT");
	}

	#[test]
	fn candidate_prefers_projection_range() {
		let dataset = CoverageDataset::from_record(record()).unwrap();
		assert!(dataset.is_candidate(10_000, "MERCATOR"));
		assert!(!dataset.is_candidate(100, "MERCATOR"));
		// unknown projection falls back to the default range
		assert!(dataset.is_candidate(100, "POLAR"));
	}

	#[test]
	fn bad_wkt_is_rejected() {
		let mut bad = record();
		bad.polygons = vec!["POLYGON((1 2".to_string()];
		assert!(CoverageDataset::from_record(bad).is_err());
	}
}
