//! Interactive metadata handling: extracting feature rectangles from
//! renderer output and cutting them from metatile pixel space into
//! per-sub-tile feature collections.
//!
//! Geometries here are axis-aligned pixel rectangles encoded as GeoJSON
//! MultiPolygons (one outer ring per rectangle, no holes) whose coordinates
//! are pixel offsets, not degrees.

use crate::result::empty_collection;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::warn;
use serde_json::json;
use std::collections::BTreeMap;

/// A rectangle in metatile pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
	pub x0: f64,
	pub y0: f64,
	pub x1: f64,
	pub y1: f64,
}

impl PixelRect {
	fn ring(&self) -> Vec<Vec<f64>> {
		vec![
			vec![self.x0, self.y0],
			vec![self.x1, self.y0],
			vec![self.x1, self.y1],
			vec![self.x0, self.y1],
		]
	}
}

/// Builds a feature from rectangles plus id/name, the shape search plugins
/// report rasterized POIs in.
pub fn rect_feature(id: u64, name: &str, rects: &[PixelRect]) -> Feature {
	let coordinates: Vec<Vec<Vec<Vec<f64>>>> = rects.iter().map(|r| vec![r.ring()]).collect();
	Feature {
		bbox: None,
		geometry: Some(Geometry::new(Value::MultiPolygon(coordinates))),
		id: Some(Id::Number(id.into())),
		properties: Some(
			json!({ "name": name, "type": "poi" })
				.as_object()
				.cloned()
				.unwrap_or_default(),
		),
		foreign_members: None,
	}
}

/// Appends a feature, merging with the previous one when ids match.
/// Search plugins report features sorted by id, so only the last feature
/// needs checking.
pub fn push_merging(collection: &mut FeatureCollection, feature: Feature) {
	if let (Some(last), Some(id)) = (collection.features.last_mut(), feature.id.clone()) {
		if last.id.as_ref() == Some(&id) {
			if let (
				Some(Geometry { value: Value::MultiPolygon(existing), .. }),
				Some(Geometry { value: Value::MultiPolygon(incoming), .. }),
			) = (last.geometry.as_mut(), feature.geometry.clone())
			{
				existing.extend(incoming);
				return;
			}
		}
	}
	collection.features.push(feature);
}

/// Rectangles of a feature's MultiPolygon geometry. Only the outer ring is
/// honored; the first and third ring positions are taken as the corners.
fn feature_rects(geometry: &Geometry) -> Vec<PixelRect> {
	let Value::MultiPolygon(polygons) = &geometry.value else {
		warn!("unsupported metadata geometry, only MultiPolygon rectangles are cut");
		return Vec::new();
	};
	let mut rects = Vec::new();
	for polygon in polygons {
		let Some(ring) = polygon.first() else { continue };
		if ring.len() < 3 || ring[0].len() < 2 || ring[2].len() < 2 {
			continue;
		}
		rects.push(PixelRect {
			x0: ring[0][0],
			y0: ring[0][1],
			x1: ring[2][0],
			y1: ring[2][1],
		});
	}
	rects
}

/// Clips one feature's rectangles to a `dimensions` grid of
/// `width × height` pixel cells. Returns per-cell MultiPolygon coordinates
/// with cell-local pixel offsets.
fn clip_geometry(
	pixels: (u32, u32),
	dimensions: (u32, u32),
	geometry: &Geometry,
) -> BTreeMap<(u32, u32), Vec<Vec<Vec<Vec<f64>>>>> {
	let mut geometries: BTreeMap<(u32, u32), Vec<Vec<Vec<Vec<f64>>>>> = BTreeMap::new();
	let width = f64::from(pixels.0);
	let height = f64::from(pixels.1);

	for rect in feature_rects(geometry) {
		// degenerate rectangles carry no pixels
		if rect.y1 - rect.y0 == 0.0 && rect.x1 - rect.x0 == 0.0 {
			continue;
		}
		let row_min = (rect.y0 / height).floor() as i64;
		let row_max = (rect.y1 / height).floor() as i64;
		let col_min = (rect.x0 / width).floor() as i64;
		let col_max = (rect.x1 / width).floor() as i64;

		for row in row_min..=row_max {
			for col in col_min..=col_max {
				if row < 0 || row >= i64::from(dimensions.0) || col < 0 || col >= i64::from(dimensions.1) {
					continue;
				}
				let cell = (
					width * col as f64,
					height * row as f64,
					width * (col + 1) as f64,
					height * (row + 1) as f64,
				);
				let clipped = PixelRect {
					x0: if rect.x0 > cell.0 { rect.x0 - cell.0 } else { 0.0 },
					y0: if rect.y0 > cell.1 { rect.y0 - cell.1 } else { 0.0 },
					x1: if rect.x1 < cell.2 { rect.x1 - cell.0 } else { width - 1.0 },
					y1: if rect.y1 < cell.3 { rect.y1 - cell.1 } else { height - 1.0 },
				};
				geometries
					.entry((row as u32, col as u32))
					.or_default()
					.push(vec![clipped.ring()]);
			}
		}
	}

	geometries
}

/// Cuts a feature collection in metatile pixel space into one collection
/// per sub-tile. Every sub-tile gets a collection, empty ones included.
pub fn cut_features(
	features: Option<&FeatureCollection>,
	pixels: (u32, u32),
	dimensions: (u32, u32),
) -> BTreeMap<(u32, u32), FeatureCollection> {
	let mut cut = BTreeMap::new();
	if pixels.0 < 1 || pixels.1 < 1 || dimensions.0 < 1 || dimensions.1 < 1 {
		return cut;
	}
	let width = pixels.0 / dimensions.1;
	let height = pixels.1 / dimensions.0;
	if width < 1 || height < 1 {
		return cut;
	}

	for row in 0..dimensions.0 {
		for col in 0..dimensions.1 {
			cut.insert((row, col), empty_collection());
		}
	}

	if let Some(features) = features {
		for feature in &features.features {
			let Some(geometry) = &feature.geometry else { continue };
			for (position, coordinates) in clip_geometry((width, height), dimensions, geometry) {
				if let Some(collection) = cut.get_mut(&position) {
					collection.features.push(Feature {
						bbox: None,
						geometry: Some(Geometry::new(Value::MultiPolygon(coordinates))),
						id: feature.id.clone(),
						properties: feature.properties.clone(),
						foreign_members: None,
					});
				}
			}
		}
	}

	cut
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collection(features: Vec<Feature>) -> FeatureCollection {
		FeatureCollection {
			bbox: None,
			features,
			foreign_members: None,
		}
	}

	#[test]
	fn every_sub_tile_gets_a_collection() {
		let cut = cut_features(None, (512, 512), (2, 2));
		assert_eq!(cut.len(), 4);
		assert!(cut.values().all(|c| c.features.is_empty()));
	}

	#[test]
	fn feature_lands_in_its_cell() {
		let feature = rect_feature(
			7,
			"diner",
			&[PixelRect { x0: 300.0, y0: 40.0, x1: 340.0, y1: 60.0 }],
		);
		let cut = cut_features(Some(&collection(vec![feature])), (512, 512), (2, 2));

		assert_eq!(cut[&(0, 1)].features.len(), 1);
		assert!(cut[&(0, 0)].features.is_empty());

		// coordinates are rebased onto the cell
		let geometry = cut[&(0, 1)].features[0].geometry.as_ref().unwrap();
		let Value::MultiPolygon(polygons) = &geometry.value else { panic!() };
		assert_eq!(polygons[0][0][0], vec![44.0, 40.0]);
	}

	#[test]
	fn feature_straddling_cells_is_clipped_into_both() {
		let feature = rect_feature(
			7,
			"bridge",
			&[PixelRect { x0: 200.0, y0: 10.0, x1: 300.0, y1: 20.0 }],
		);
		let cut = cut_features(Some(&collection(vec![feature])), (512, 512), (2, 2));
		assert_eq!(cut[&(0, 0)].features.len(), 1);
		assert_eq!(cut[&(0, 1)].features.len(), 1);
	}

	#[test]
	fn merging_extends_the_previous_feature() {
		let mut collection = empty_collection();
		push_merging(
			&mut collection,
			rect_feature(1, "a", &[PixelRect { x0: 0.0, y0: 0.0, x1: 2.0, y1: 2.0 }]),
		);
		push_merging(
			&mut collection,
			rect_feature(1, "a", &[PixelRect { x0: 4.0, y0: 4.0, x1: 6.0, y1: 6.0 }]),
		);
		push_merging(
			&mut collection,
			rect_feature(2, "b", &[PixelRect { x0: 8.0, y0: 8.0, x1: 9.0, y1: 9.0 }]),
		);

		assert_eq!(collection.features.len(), 2);
		let Value::MultiPolygon(polygons) =
			&collection.features[0].geometry.as_ref().unwrap().value
		else {
			panic!()
		};
		assert_eq!(polygons.len(), 2);
	}
}
