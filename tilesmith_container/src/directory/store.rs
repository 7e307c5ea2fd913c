//! Disk-backed tile store. Writes go through a temp file named by process
//! and thread id, then an atomic rename, so concurrent writers to the same
//! tile cannot interleave; the later rename wins.

use super::TileLayout;
use anyhow::{Context, Result};
use filetime::FileTime;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tilesmith_core::Blob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId<'a> {
	pub version: &'a str,
	pub style: &'a str,
	pub z: u8,
	pub x: u32,
	pub y: u32,
	pub ext: &'a str,
}

pub struct TileStore {
	layout: TileLayout,
}

impl TileStore {
	pub fn new(root: &Path) -> TileStore {
		TileStore {
			layout: TileLayout::new(root),
		}
	}

	pub fn layout(&self) -> &TileLayout {
		&self.layout
	}

	fn path(&self, id: &TileId) -> PathBuf {
		self
			.layout
			.tile_path(id.version, id.style, id.z, id.x, id.y, id.ext)
	}

	pub fn exists(&self, id: &TileId) -> bool {
		self.path(id).is_file()
	}

	/// Reads a tile, `None` if it is not stored.
	pub fn get(&self, id: &TileId) -> Result<Option<Blob>> {
		let path = self.path(id);
		match fs::read(&path) {
			Ok(bytes) => Ok(Some(Blob::from(bytes))),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e).with_context(|| format!("reading tile {path:?}")),
		}
	}

	/// Writes a tile atomically: temp file in the sibling `.tmp` directory,
	/// then rename into place.
	pub fn put(&self, id: &TileId, data: &Blob) -> Result<()> {
		let path = self.path(id);
		let dir = path.parent().unwrap();
		fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;

		let tmp_dir = self.layout.tmp_dir();
		fs::create_dir_all(&tmp_dir).with_context(|| format!("creating {tmp_dir:?}"))?;
		let tmp_path = tmp_dir.join(format!(".{}_{}", std::process::id(), thread_tag()));

		debug!("saving tile to {tmp_path:?}");
		fs::write(&tmp_path, data.as_slice()).with_context(|| format!("writing {tmp_path:?}"))?;
		fs::rename(&tmp_path, &path).with_context(|| format!("renaming into {path:?}"))?;
		Ok(())
	}

	/// Modification time as unix seconds, `None` if the tile is not stored.
	pub fn modified_time(&self, id: &TileId) -> Option<i64> {
		let metadata = fs::metadata(self.path(id)).ok()?;
		let modified = metadata.modified().ok()?;
		match modified.duration_since(UNIX_EPOCH) {
			Ok(duration) => Some(duration.as_secs() as i64),
			Err(e) => Some(-(e.duration().as_secs() as i64)),
		}
	}

	/// Re-dates a stored tile; reports whether a tile was there to re-date.
	pub fn set_modified_time(&self, id: &TileId, unix_seconds: i64) -> Result<bool> {
		let path = self.path(id);
		if !path.is_file() {
			return Ok(false);
		}
		filetime::set_file_mtime(&path, FileTime::from_unix_time(unix_seconds, 0))
			.with_context(|| format!("setting mtime of {path:?}"))?;
		Ok(true)
	}
}

/// Numeric tag for the current thread, distinct per live thread.
fn thread_tag() -> String {
	let formatted = format!("{:?}", std::thread::current().id());
	formatted.chars().filter(char::is_ascii_digit).collect()
}
