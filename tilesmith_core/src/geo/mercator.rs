//! Spherical-Mercator projection with per-zoom precomputed constants.
//!
//! `to_pixels`/`from_pixels` map between geographic degrees and the global
//! pixel grid at a zoom level (256 px per tile). The rest of the stack only
//! needs metatile bounding boxes and the fixed scale-denominator ladder used
//! for coverage selection.

use super::{GeoBBox, LatLng};
use crate::types::TILE_SIZE;
use anyhow::{Result, ensure};
use std::f64::consts::PI;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Scale denominators per zoom level, as used by coverage scale ranges.
const SCALES: [u64; 21] = [
	443744033, 221872016, 110936008, 55468004, 27734002, 13867001, 6933501, 3466750, 1733375,
	866688, 433344, 216672, 108336, 54168, 27084, 13542, 6771, 3385, 1693, 846, 423,
];

/// Scale denominator for a zoom level; beyond the tabulated ladder each
/// level halves the previous one.
pub fn scale_denominator(z: u8) -> u64 {
	let z = z as usize;
	if z < SCALES.len() {
		SCALES[z]
	} else {
		SCALES[SCALES.len() - 1] >> (z - SCALES.len() + 1)
	}
}

/// Brings a value into a circular range, so longitudes like 361° wrap to 1°.
fn circular_clamp(low: f64, high: f64, value: f64) -> f64 {
	let (low, high) = if low > high { (high, low) } else { (low, high) };
	let length = high - low + 1.0;
	if value < low {
		let moved = ((value - low).abs() / length).trunc() * -length + low;
		high - (value - moved).abs()
	} else if value > high {
		let moved = ((value - high).abs() / length).trunc() * length + high;
		low + (value - moved).abs()
	} else {
		value
	}
}

pub struct Mercator {
	bc: Vec<f64>,
	cc: Vec<f64>,
	zc: Vec<f64>,
}

impl Mercator {
	pub fn new(levels: u8) -> Mercator {
		let mut bc = Vec::with_capacity(levels as usize);
		let mut cc = Vec::with_capacity(levels as usize);
		let mut zc = Vec::with_capacity(levels as usize);
		let mut c = f64::from(TILE_SIZE);
		for _ in 0..levels {
			bc.push(c / 360.0);
			cc.push(c / (2.0 * PI));
			zc.push(c / 2.0);
			c *= 2.0;
		}
		Mercator { bc, cc, zc }
	}

	fn check_zoom(&self, zoom: u8) -> Result<()> {
		ensure!(
			(zoom as usize) < self.zc.len(),
			"zoom {zoom} exceeds the {} precomputed levels",
			self.zc.len()
		);
		Ok(())
	}

	/// Projects `(lng, lat)` degrees to global pixel coordinates at `zoom`.
	pub fn to_pixels(&self, lng: f64, lat: f64, zoom: u8) -> Result<(f64, f64)> {
		self.check_zoom(zoom)?;
		let z = zoom as usize;
		let d = self.zc[z];
		let e = (d + lng * self.bc[z]).round();
		let f = (lat * DEG_TO_RAD).sin().clamp(-0.9999, 0.9999);
		let g = (d + 0.5 * ((1.0 + f) / (1.0 - f)).ln() * -self.cc[z]).round();
		Ok((e, g))
	}

	/// Inverse of [`to_pixels`](Self::to_pixels); returns `(lng, lat)`.
	pub fn from_pixels(&self, px: f64, py: f64, zoom: u8) -> Result<(f64, f64)> {
		self.check_zoom(zoom)?;
		let z = zoom as usize;
		let lng = (px - self.zc[z]) / self.bc[z];
		let g = (py - self.zc[z]) / -self.cc[z];
		let lat = RAD_TO_DEG * (2.0 * g.exp().atan() - 0.5 * PI);
		Ok((lng, lat))
	}

	/// Tile coordinate containing a geographic position.
	pub fn tile_at(&self, lat: f64, lng: f64, zoom: u8) -> Result<(u32, u32)> {
		let lat = circular_clamp(-90.0, 90.0, lat);
		let lng = circular_clamp(-180.0, 180.0, lng);
		let (px, py) = self.to_pixels(lng, lat, zoom)?;
		Ok((
			(px / f64::from(TILE_SIZE)) as u32,
			(py / f64::from(TILE_SIZE)) as u32,
		))
	}

	/// Bounding box and center of a block of `dimension × dimension` tiles
	/// anchored at `(x, y)`.
	pub fn block_bounds(&self, x: u32, y: u32, z: u8, dimension: u32) -> Result<(GeoBBox, LatLng)> {
		let tile = f64::from(TILE_SIZE);
		let x0 = f64::from(x) * tile;
		let y0 = f64::from(y + dimension) * tile;
		let x1 = f64::from(x + dimension) * tile;
		let y1 = f64::from(y) * tile;

		let (west, south) = self.from_pixels(x0, y0, z)?;
		let (east, north) = self.from_pixels(x1, y1, z)?;

		let cx = ((x0 + x1) / 2.0 + 0.5).trunc();
		let cy = ((y0 + y1) / 2.0 + 0.5).trunc();
		let (clng, clat) = self.from_pixels(cx, cy, z)?;

		Ok((
			GeoBBox::new(west, south, east, north),
			LatLng { lat: clat, lng: clng },
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pixel_round_trip() {
		let mercator = Mercator::new(19);
		let (px, py) = mercator.to_pixels(-120.0, 36.0, 5).unwrap();
		let (lng, lat) = mercator.from_pixels(px, py, 5).unwrap();
		assert!((lng + 120.0).abs() < 0.1);
		assert!((lat - 36.0).abs() < 0.1);
	}

	#[test]
	fn world_bounds_at_zero() {
		let mercator = Mercator::new(19);
		let (bbox, center) = mercator.block_bounds(0, 0, 0, 1).unwrap();
		assert!((bbox.west + 180.0).abs() < 1e-6);
		assert!((bbox.east - 180.0).abs() < 1e-6);
		assert!(bbox.north > 85.0 && bbox.north < 86.0);
		assert!((center.lat).abs() < 1e-6);
		assert!((center.lng).abs() < 1e-6);
	}

	#[test]
	fn clamp_wraps_longitudes() {
		assert_eq!(circular_clamp(-180.0, 180.0, 90.0), 90.0);
		assert!(circular_clamp(-180.0, 180.0, 200.0) < 0.0);
	}

	#[test]
	fn scale_ladder() {
		assert_eq!(scale_denominator(0), 443744033);
		assert_eq!(scale_denominator(20), 423);
		assert_eq!(scale_denominator(21), 211);
	}
}
