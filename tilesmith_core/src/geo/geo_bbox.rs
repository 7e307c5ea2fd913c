use std::fmt::{self, Debug};

/// A geographic point in degrees.
#[derive(Clone, Copy, PartialEq)]
pub struct LatLng {
	pub lat: f64,
	pub lng: f64,
}

impl Debug for LatLng {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{},{}]", self.lat, self.lng)
	}
}

/// A geographic bounding box in degrees: west/south is the lower-left
/// corner, east/north the upper-right.
#[derive(Clone, Copy, PartialEq)]
pub struct GeoBBox {
	pub west: f64,
	pub south: f64,
	pub east: f64,
	pub north: f64,
}

impl GeoBBox {
	pub fn new(west: f64, south: f64, east: f64, north: f64) -> GeoBBox {
		GeoBBox { west, south, east, north }
	}

	/// The four corners in `(lat, lng)` order: SW, NE, NW, SE — the order
	/// the coverage point check probes them in.
	pub fn corners(&self) -> [LatLng; 4] {
		[
			LatLng { lat: self.south, lng: self.west },
			LatLng { lat: self.north, lng: self.east },
			LatLng { lat: self.north, lng: self.west },
			LatLng { lat: self.south, lng: self.east },
		]
	}
}

impl Debug for GeoBBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"GeoBBox[{},{},{},{}]",
			self.west, self.south, self.east, self.north
		)
	}
}
