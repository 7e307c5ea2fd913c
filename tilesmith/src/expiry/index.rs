//! The backing store: one memory-mapped file per style, one bit per
//! metatile. Files are grown to the size the configured max zoom needs and
//! never shrunk, so a restart with a lower limit cannot lose bits.

use anyhow::{Context, Result};
use log::info;
use memmap2::MmapMut;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tilesmith_core::morton::ZLevelIndex;

pub struct ExpiryFile {
	file: fs::File,
	mmap: MmapMut,
}

impl ExpiryFile {
	/// Opens (creating if necessary) and maps the bit file, expanding it to
	/// at least `byte_size` bytes.
	pub fn open(path: &Path, byte_size: u64) -> Result<ExpiryFile> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(path)
			.with_context(|| format!("opening expiry file {path:?}"))?;

		let current = file.metadata()?.len();
		if byte_size > current {
			info!("expanding {path:?} to {byte_size} bytes");
			file.set_len(byte_size)
				.with_context(|| format!("expanding {path:?}"))?;
		}

		let mmap = unsafe { MmapMut::map_mut(&file) }
			.with_context(|| format!("mapping expiry file {path:?}"))?;
		Ok(ExpiryFile { file, mmap })
	}

	/// Number of addressable bits.
	pub fn max_idx(&self) -> u64 {
		self.mmap.len() as u64 * 8
	}

	/// Sets a bit; out-of-range indices are ignored.
	pub fn set_bit(&mut self, idx: u64, value: bool) {
		if idx >= self.max_idx() {
			return;
		}
		let byte = (idx / 8) as usize;
		let mask = 1u8 << (idx % 8);
		if value {
			self.mmap[byte] |= mask;
		} else {
			self.mmap[byte] &= !mask;
		}
	}

	/// Reads a bit, `None` when out of range.
	pub fn get_bit(&self, idx: u64) -> Option<bool> {
		if idx >= self.max_idx() {
			return None;
		}
		let byte = (idx / 8) as usize;
		Some(self.mmap[byte] >> (idx % 8) & 1 == 1)
	}

	/// Flushes the mapping and fsyncs the file, so a crash loses at most
	/// one flush period of updates.
	pub fn flush(&self) -> Result<()> {
		self.mmap.flush().context("flushing expiry mmap")?;
		self.file.sync_all().context("syncing expiry file")?;
		Ok(())
	}
}

/// All styles' expiry files under one directory, opened on demand.
pub struct ExpiryIndex {
	directory: PathBuf,
	byte_size: u64,
	files: HashMap<String, ExpiryFile>,
}

impl ExpiryIndex {
	/// Opens the directory (creating it) and pre-opens every file already
	/// present, so bits survive restarts without waiting for traffic.
	pub fn open(directory: &Path, max_z: u8) -> Result<ExpiryIndex> {
		fs::create_dir_all(directory)
			.with_context(|| format!("creating expiry directory {directory:?}"))?;
		let byte_size = ZLevelIndex::new().byte_size(max_z);

		let mut files = HashMap::new();
		for entry in fs::read_dir(directory)? {
			let entry = entry?;
			if entry.path().is_file() {
				let name = entry.file_name().to_string_lossy().to_string();
				files.insert(name.clone(), ExpiryFile::open(&entry.path(), byte_size)?);
			}
		}

		Ok(ExpiryIndex {
			directory: directory.to_path_buf(),
			byte_size,
			files,
		})
	}

	/// A style is storable if its name is a plain file name.
	pub fn accepts(style: &str) -> bool {
		!style.is_empty() && !style.contains('/') && !style.contains('\\') && style != "." && style != ".."
	}

	/// The style's file, created and mapped on first reference.
	pub fn file_mut(&mut self, style: &str) -> Result<&mut ExpiryFile> {
		if !self.files.contains_key(style) {
			let path = self.directory.join(style);
			let file = ExpiryFile::open(&path, self.byte_size)?;
			self.files.insert(style.to_string(), file);
		}
		Ok(self.files.get_mut(style).unwrap())
	}

	pub fn file(&self, style: &str) -> Option<&ExpiryFile> {
		self.files.get(style)
	}

	pub fn flush_all(&self) {
		for (style, file) in &self.files {
			if let Err(e) = file.flush() {
				log::error!("flushing expiry file for '{style}': {e:#}");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_fs::TempDir;

	#[test]
	fn bits_round_trip() {
		let dir = TempDir::new().unwrap();
		let mut index = ExpiryIndex::open(dir.path(), 10).unwrap();
		let file = index.file_mut("map").unwrap();

		assert_eq!(file.get_bit(42), Some(false));
		file.set_bit(42, true);
		assert_eq!(file.get_bit(42), Some(true));
		file.set_bit(42, false);
		assert_eq!(file.get_bit(42), Some(false));
	}

	#[test]
	fn out_of_range_reads_are_none_and_writes_ignored() {
		let dir = TempDir::new().unwrap();
		let mut index = ExpiryIndex::open(dir.path(), 4).unwrap();
		let file = index.file_mut("map").unwrap();
		let beyond = file.max_idx() + 7;
		file.set_bit(beyond, true);
		assert_eq!(file.get_bit(beyond), None);
	}

	#[test]
	fn bits_survive_reopen() {
		let dir = TempDir::new().unwrap();
		{
			let mut index = ExpiryIndex::open(dir.path(), 10).unwrap();
			let file = index.file_mut("map").unwrap();
			file.set_bit(1234, true);
			file.flush().unwrap();
		}
		let index = ExpiryIndex::open(dir.path(), 10).unwrap();
		assert_eq!(index.file("map").unwrap().get_bit(1234), Some(true));
	}

	#[test]
	fn reopening_with_lower_max_z_keeps_the_file_size() {
		let dir = TempDir::new().unwrap();
		{
			let mut index = ExpiryIndex::open(dir.path(), 12).unwrap();
			index.file_mut("map").unwrap();
		}
		let larger = ZLevelIndex::new().byte_size(12);
		{
			let mut index = ExpiryIndex::open(dir.path(), 6).unwrap();
			let file = index.file_mut("map").unwrap();
			assert_eq!(file.max_idx(), larger * 8);
		}
	}

	#[test]
	fn style_names_are_sanitised() {
		assert!(ExpiryIndex::accepts("map"));
		assert!(!ExpiryIndex::accepts("../map"));
		assert!(!ExpiryIndex::accepts(""));
	}
}
