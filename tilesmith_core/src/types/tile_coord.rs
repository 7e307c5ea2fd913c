//! Tile coordinates under the usual slippy-map addressing: `x` grows east,
//! `y` grows south, `z` selects one of `2^z × 2^z` tiles.

use super::MAX_ZOOM;
use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
	pub x: u32,
	pub y: u32,
	pub z: u8,
}

impl TileCoord {
	pub fn new(z: u8, x: u32, y: u32) -> Result<TileCoord> {
		let coord = TileCoord { x, y, z };
		ensure!(coord.is_valid(), "invalid tile coordinate {coord:?}");
		Ok(coord)
	}

	/// `0 ≤ z ≤ 30` and `x, y < 2^z`.
	pub fn is_valid(&self) -> bool {
		if self.z > MAX_ZOOM {
			return false;
		}
		let max = 1u32 << self.z;
		self.x < max && self.y < max
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileCoord({}:{}:{})", self.z, self.x, self.y)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0, 0, 0, true)]
	#[case(0, 1, 0, false)]
	#[case(1, 1, 1, true)]
	#[case(1, 2, 0, false)]
	#[case(15, 19294, 24642, true)]
	#[case(30, (1 << 30) - 1, 0, true)]
	#[case(31, 0, 0, false)]
	fn validity(#[case] z: u8, #[case] x: u32, #[case] y: u32, #[case] valid: bool) {
		assert_eq!(TileCoord { x, y, z }.is_valid(), valid);
		assert_eq!(TileCoord::new(z, x, y).is_ok(), valid);
	}
}
