//! Tile formats as they appear on the wire and in configuration.
//!
//! The wire knows four payload kinds with fixed bit values (PNG=1, JPEG=2,
//! GIF=4, JSON=8); a metatile container may carry several at once, so the
//! format field is an [`EnumSet`]. Configuration uses richer *names*
//! ([`FormatName`]): `png256` and `png` are distinct encodings that share
//! the PNG wire code.

use anyhow::{Result, bail};
use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Wire-level payload format. Variant order fixes the `EnumSet` bit values:
/// PNG=1, JPEG=2, GIF=4, JSON=8.
#[allow(clippy::upper_case_acronyms)]
#[derive(EnumSetType, Debug, Hash)]
pub enum TileFormat {
	PNG,
	JPEG,
	GIF,
	JSON,
}

impl TileFormat {
	/// The numeric code written into metatile headers.
	pub fn code(&self) -> u32 {
		EnumSet::only(*self).as_u32()
	}

	pub fn from_code(code: u32) -> Result<TileFormat> {
		match code {
			1 => Ok(TileFormat::PNG),
			2 => Ok(TileFormat::JPEG),
			4 => Ok(TileFormat::GIF),
			8 => Ok(TileFormat::JSON),
			_ => bail!("unknown tile format code {code}"),
		}
	}

	pub fn extension(&self) -> &str {
		match self {
			TileFormat::PNG => "png",
			TileFormat::JPEG => "jpeg",
			TileFormat::GIF => "gif",
			TileFormat::JSON => "json",
		}
	}
}

impl Display for TileFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.extension())
	}
}

/// A format as named in configuration. Several names can map onto one wire
/// format: `png256` is palettized PNG, `png` is full-color.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatName {
	Png,
	Png256,
	Jpeg,
	Gif,
	Json,
}

impl FormatName {
	pub fn parse(name: &str) -> Result<FormatName> {
		match name {
			"png" => Ok(FormatName::Png),
			"png256" => Ok(FormatName::Png256),
			"jpeg" => Ok(FormatName::Jpeg),
			"gif" => Ok(FormatName::Gif),
			"json" => Ok(FormatName::Json),
			_ => bail!("unknown format name '{name}'"),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			FormatName::Png => "png",
			FormatName::Png256 => "png256",
			FormatName::Jpeg => "jpeg",
			FormatName::Gif => "gif",
			FormatName::Json => "json",
		}
	}

	pub fn wire_format(&self) -> TileFormat {
		match self {
			FormatName::Png | FormatName::Png256 => TileFormat::PNG,
			FormatName::Jpeg => TileFormat::JPEG,
			FormatName::Gif => TileFormat::GIF,
			FormatName::Json => TileFormat::JSON,
		}
	}
}

impl Display for FormatName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Content type for serving a tile by file extension.
pub fn content_type_for_extension(extension: &str) -> &'static str {
	match extension {
		"gif" => "image/gif",
		"png" => "image/png",
		"jpg" | "jpeg" => "image/jpeg",
		"json" => "application/json;charset=UTF-8",
		_ => "application/octet-stream",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_codes_match_bitset_positions() {
		assert_eq!(TileFormat::PNG.code(), 1);
		assert_eq!(TileFormat::JPEG.code(), 2);
		assert_eq!(TileFormat::GIF.code(), 4);
		assert_eq!(TileFormat::JSON.code(), 8);

		let set = TileFormat::PNG | TileFormat::JSON;
		assert_eq!(set.as_u32(), 9);
	}

	#[test]
	fn code_round_trip() {
		for format in EnumSet::<TileFormat>::all() {
			assert_eq!(TileFormat::from_code(format.code()).unwrap(), format);
		}
		assert!(TileFormat::from_code(3).is_err());
	}

	#[test]
	fn names_share_wire_formats() {
		assert_eq!(FormatName::Png.wire_format(), TileFormat::PNG);
		assert_eq!(FormatName::Png256.wire_format(), TileFormat::PNG);
		assert_eq!(FormatName::parse("png256").unwrap(), FormatName::Png256);
		assert!(FormatName::parse("webp").is_err());
	}

	#[test]
	fn content_types() {
		assert_eq!(content_type_for_extension("png"), "image/png");
		assert_eq!(content_type_for_extension("jpg"), "image/jpeg");
		assert_eq!(content_type_for_extension("unk"), "application/octet-stream");
	}
}
