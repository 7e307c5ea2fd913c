//! A thin wrapper around [`Vec<u8>`] used for tile payloads and metatile
//! containers. Keeps byte handling explicit at API boundaries and offers
//! range reads for the container codec.

use super::ByteRange;
use anyhow::{Result, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Debug;
use std::ops::Range;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// Creates an empty `Blob`.
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Interprets the bytes as UTF-8, lossily.
	pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
		String::from_utf8_lossy(&self.0)
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	pub fn get_range(&self, range: Range<usize>) -> &[u8] {
		&self.0[range]
	}

	/// Returns the bytes covered by `range`, failing if the range does not
	/// fit inside the blob.
	pub fn read_range(&self, range: &ByteRange) -> Result<&[u8]> {
		let end = range.offset + range.length;
		ensure!(
			end <= self.len(),
			"byte range {range:?} exceeds blob length {}",
			self.len()
		);
		Ok(&self.0[range.offset as usize..end as usize])
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Blob({} bytes)", self.0.len())
	}
}

impl From<Vec<u8>> for Blob {
	fn from(value: Vec<u8>) -> Self {
		Blob(value)
	}
}

impl From<&[u8]> for Blob {
	fn from(value: &[u8]) -> Self {
		Blob(value.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(value: &str) -> Self {
		Blob(value.as_bytes().to_vec())
	}
}

impl From<String> for Blob {
	fn from(value: String) -> Self {
		Blob(value.into_bytes())
	}
}

impl Serialize for Blob {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.0.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Blob {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Ok(Blob(Vec::<u8>::deserialize(deserializer)?))
	}
}
