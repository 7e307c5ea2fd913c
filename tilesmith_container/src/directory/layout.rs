//! Maps tile addresses to paths. Both x and y are split into three groups
//! of three decimal digits, so no directory ever holds more than 1,000
//! entries:
//!
//! ```text
//! <root>/<version>/<style>/<z>/<x1>/<x2>/<x3>/<y1>/<y2>/<y3>.<ext>
//! ```
//!
//! where `x = x1·10^6 + x2·10^3 + x3`, each group zero-padded.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TileLayout {
	root: PathBuf,
}

impl TileLayout {
	pub fn new(root: &Path) -> TileLayout {
		TileLayout { root: root.to_path_buf() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn split(value: u32) -> [String; 3] {
		[
			format!("{:03}", value / 1_000_000),
			format!("{:03}", (value / 1_000) % 1_000),
			format!("{:03}", value % 1_000),
		]
	}

	/// Directory holding the tile (everything up to the filename).
	pub fn tile_dir(&self, version: &str, style: &str, z: u8, x: u32, y: u32) -> PathBuf {
		let x_parts = Self::split(x);
		let y_parts = Self::split(y);
		let mut path = self.root.join(version);
		path.push(style);
		path.push(z.to_string());
		for part in &x_parts {
			path.push(part);
		}
		path.push(&y_parts[0]);
		path.push(&y_parts[1]);
		path
	}

	/// Full path of the tile file.
	pub fn tile_path(&self, version: &str, style: &str, z: u8, x: u32, y: u32, ext: &str) -> PathBuf {
		let y_parts = Self::split(y);
		self
			.tile_dir(version, style, z, x, y)
			.join(format!("{}.{ext}", y_parts[2]))
	}

	/// Directory for in-flight writes, a sibling of the root so renames
	/// stay on one filesystem.
	pub fn tmp_dir(&self) -> PathBuf {
		let mut name = self.root.as_os_str().to_os_string();
		name.push(".tmp");
		PathBuf::from(name)
	}
}
