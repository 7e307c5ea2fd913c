//! Morton (Z-order) bit interleaving and the expiry index address space.
//!
//! Expiry information is tracked per metatile, per style, as one bit in a
//! flat array. The array is laid out zoom level by zoom level; inside a
//! level, metatiles are addressed by the Morton code of their metatile
//! coordinates, which keeps neighborhoods close together in the file.

use crate::types::{MAX_EXPIRY_Z, METATILE};
use anyhow::{Result, ensure};

/// Spreads the bits of a 32-bit number into the even positions of a 64-bit
/// number: `0b11011` becomes `0b101_0001_0101 >> ...` — each input bit moves
/// to twice its position.
pub fn interleave(n: u32) -> u64 {
	let mut n = u64::from(n);
	n = (n | (n << 16)) & 0x0000_FFFF_0000_FFFF;
	n = (n | (n << 8)) & 0x00FF_00FF_00FF_00FF;
	n = (n | (n << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
	n = (n | (n << 2)) & 0x3333_3333_3333_3333;
	n = (n | (n << 1)) & 0x5555_5555_5555_5555;
	n
}

/// Inverse of [`interleave`]: collapses the even bits of a 64-bit number
/// back into a 32-bit number.
pub fn uninterleave(n: u64) -> u32 {
	let mut n = n & 0x5555_5555_5555_5555;
	n = (n ^ (n >> 1)) & 0x3333_3333_3333_3333;
	n = (n ^ (n >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
	n = (n ^ (n >> 4)) & 0x00FF_00FF_00FF_00FF;
	n = (n ^ (n >> 8)) & 0x0000_FFFF_0000_FFFF;
	n = (n ^ (n >> 16)) & 0xFFFF_FFFF;
	n as u32
}

/// Per-zoom bit offsets into the expiry array. One array covers all zoom
/// levels of one style so a single file can be synced to disk.
pub struct ZLevelIndex {
	offsets: Vec<u64>,
}

impl Default for ZLevelIndex {
	fn default() -> Self {
		Self::new()
	}
}

impl ZLevelIndex {
	pub fn new() -> ZLevelIndex {
		// 4^max(0, z-3) metatiles per level: one metatile spans 8 tiles,
		// so levels 0..=3 hold a single metatile each.
		let mut offsets = Vec::with_capacity(MAX_EXPIRY_Z as usize + 2);
		offsets.push(0u64);
		for z in 0..=MAX_EXPIRY_Z {
			let bits = 4u64.pow(u32::from(z.saturating_sub(3)));
			offsets.push(offsets[z as usize] + bits);
		}
		ZLevelIndex { offsets }
	}

	/// Bit offset of the first metatile at zoom `z`.
	pub fn offset(&self, z: u8) -> u64 {
		self.offsets[z as usize]
	}

	/// Number of bits needed to track all metatiles up to and including
	/// `max_z`.
	pub fn bit_size(&self, max_z: u8) -> u64 {
		self.offsets[max_z as usize + 1]
	}

	/// Same, rounded up to whole bytes (the size of the backing file).
	pub fn byte_size(&self, max_z: u8) -> u64 {
		self.bit_size(max_z).div_ceil(8)
	}

	/// Bit index for a *metatile* coordinate `(mx, my)` (tile coordinates
	/// already divided by the metatile size).
	pub fn meta_idx(&self, mx: u32, my: u32, z: u8) -> Result<u64> {
		ensure!(z <= MAX_EXPIRY_Z, "zoom {z} exceeds the expiry index");
		let morton = (interleave(mx) << 1) | interleave(my);
		Ok(self.offset(z) + morton)
	}

	/// Bit index for a tile coordinate, anchoring to its metatile.
	pub fn tile_to_meta_idx(&self, x: u32, y: u32, z: u8) -> Result<u64> {
		self.meta_idx(x / METATILE, y / METATILE, z)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn interleave_is_invertible() {
		for n in [0u32, 1, 2, 3, 0b11011, 12345, 0xFFFF, u32::MAX] {
			assert_eq!(uninterleave(interleave(n)), n);
		}
	}

	#[test]
	fn morton_un_interleaves_both_axes() {
		for (x, y) in [(0u32, 0u32), (1, 0), (0, 1), (12345, 54321), (u32::MAX, 1)] {
			let code = (interleave(x) << 1) | interleave(y);
			assert_eq!(uninterleave(code >> 1), x);
			assert_eq!(uninterleave(code), y);
		}
	}

	#[test]
	fn offsets_grow_by_level_size() {
		let index = ZLevelIndex::new();
		assert_eq!(index.offset(0), 0);
		assert_eq!(index.offset(1), 1);
		assert_eq!(index.offset(4), 4);
		assert_eq!(index.offset(5), 8);
		assert_eq!(index.bit_size(4) - index.offset(4), 4);
	}

	#[test]
	fn indexes_stay_inside_their_level() {
		let index = ZLevelIndex::new();
		for z in [3u8, 5, 10] {
			let side = 1u32 << z.saturating_sub(3);
			let idx = index
				.meta_idx(side - 1, side - 1, z)
				.unwrap();
			assert!(idx < index.offsets[z as usize + 1]);
		}
	}

	#[test]
	fn byte_size_rounds_up() {
		let index = ZLevelIndex::new();
		assert_eq!(index.bit_size(3), 4);
		assert_eq!(index.byte_size(3), 1);
		assert!(index.byte_size(MAX_EXPIRY_Z) > 0);
	}
}
