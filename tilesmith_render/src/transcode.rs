//! Per-format serialization of rendered sub-tiles.
//!
//! Palettized targets (png256, gif) share one palette computation per
//! sub-tile: the RGB channels are quantized to 255 colors with NeuQuant and
//! the alpha channel is binarized at threshold 64 onto the 256th palette
//! index, which is declared transparent. Full-color PNG and JPEG go through
//! the `image` crate encoders with the options from configuration.

use crate::result::RenderResult;
use anyhow::{Context, Result, anyhow, ensure};
use color_quant::NeuQuant;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tilesmith_core::{Blob, FormatName};

/// Anything at or below this alpha becomes fully transparent in palettized
/// output; everything else fully opaque.
const ALPHA_THRESHOLD: u8 = 64;

/// Palette index reserved for transparency.
const TRANSPARENT_INDEX: u8 = 255;

/// Encoder options for one configured format.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatOptions {
	/// JPEG quality, 1..=100.
	pub quality: Option<u8>,
	/// Palettize the output (png256, gif).
	#[serde(default)]
	pub palette: bool,
	/// NeuQuant sample fraction; 1 is exhaustive, 10 is the usual tradeoff.
	pub sample: Option<i32>,
}

/// A sub-tile quantized once, shared by all palettized formats.
struct Palettized {
	indexed: Vec<u8>,
	/// 256 RGB triples; entry 255 is the transparent slot.
	palette: Vec<u8>,
}

fn palettize(view: &RgbaImage, sample: i32) -> Palettized {
	// Quantize on fully opaque pixels so the palette is not skewed by
	// premultiplied fringes.
	let opaque: Vec<u8> = view
		.pixels()
		.flat_map(|p| [p.0[0], p.0[1], p.0[2], 255])
		.collect();
	let quantizer = NeuQuant::new(sample, 255, &opaque);

	let mut palette = quantizer.color_map_rgb();
	palette.resize(256 * 3, 0);

	let indexed: Vec<u8> = view
		.pixels()
		.map(|p| {
			if p.0[3] <= ALPHA_THRESHOLD {
				TRANSPARENT_INDEX
			} else {
				(quantizer.index_of(&[p.0[0], p.0[1], p.0[2], 255]) as u8).min(254)
			}
		})
		.collect();

	Palettized { indexed, palette }
}

fn encode_png256(view: &RgbaImage, palettized: &Palettized) -> Result<Blob> {
	let mut trns = vec![255u8; 256];
	trns[TRANSPARENT_INDEX as usize] = 0;

	let mut buffer = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut buffer, view.width(), view.height());
		encoder.set_color(png::ColorType::Indexed);
		encoder.set_depth(png::BitDepth::Eight);
		encoder.set_palette(palettized.palette.clone());
		encoder.set_trns(trns);
		let mut writer = encoder.write_header().context("writing png256 header")?;
		writer
			.write_image_data(&palettized.indexed)
			.context("writing png256 data")?;
		writer.finish().context("finishing png256 stream")?;
	}
	Ok(Blob::from(buffer))
}

fn encode_gif(view: &RgbaImage, palettized: &Palettized) -> Result<Blob> {
	let mut buffer = Vec::new();
	{
		let mut encoder = gif::Encoder::new(
			&mut buffer,
			view.width() as u16,
			view.height() as u16,
			&[],
		)
		.context("writing gif header")?;
		let frame = gif::Frame {
			width: view.width() as u16,
			height: view.height() as u16,
			buffer: std::borrow::Cow::Borrowed(&palettized.indexed),
			palette: Some(palettized.palette.clone()),
			transparent: Some(TRANSPARENT_INDEX),
			..gif::Frame::default()
		};
		encoder.write_frame(&frame).context("writing gif frame")?;
	}
	Ok(Blob::from(buffer))
}

fn encode_png(view: &RgbaImage) -> Result<Blob> {
	let mut buffer = Vec::new();
	PngEncoder::new(&mut buffer)
		.write_image(
			view.as_raw(),
			view.width(),
			view.height(),
			ExtendedColorType::Rgba8,
		)
		.context("encoding png")?;
	Ok(Blob::from(buffer))
}

fn encode_jpeg(view: &RgbaImage, quality: u8) -> Result<Blob> {
	// JPEG has no alpha channel.
	let rgb = DynamicImage::ImageRgba8(view.clone()).to_rgb8();
	let mut buffer = Vec::new();
	JpegEncoder::new_with_quality(&mut buffer, quality)
		.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
		.context("encoding jpeg")?;
	Ok(Blob::from(buffer))
}

/// Serializes every sub-tile of `result` into every image format in
/// `formats`. `json` is not an image format and must not appear here.
pub fn transcode(
	result: &RenderResult,
	size: u32,
	formats: &[FormatName],
	options: &HashMap<FormatName, FormatOptions>,
) -> Result<BTreeMap<FormatName, BTreeMap<(u32, u32), Blob>>> {
	ensure!(
		!formats.contains(&FormatName::Json),
		"json is handled by the metadata path, not the transcoder"
	);

	let mut tiles: BTreeMap<FormatName, BTreeMap<(u32, u32), Blob>> =
		formats.iter().map(|f| (*f, BTreeMap::new())).collect();

	for row in 0..size {
		for col in 0..size {
			let view = result
				.data
				.get(&(row, col))
				.ok_or_else(|| anyhow!("render result is missing sub-tile ({row},{col})"))?;

			// one palette per sub-tile, shared between png256 and gif
			let mut palettized: Option<Palettized> = None;

			for format in formats {
				let opts = options.get(format).cloned().unwrap_or_default();
				let blob = if opts.palette || matches!(format, FormatName::Png256 | FormatName::Gif) {
					let palettized = palettized
						.get_or_insert_with(|| palettize(view, opts.sample.unwrap_or(10)));
					match format {
						FormatName::Gif => encode_gif(view, palettized)?,
						_ => encode_png256(view, palettized)?,
					}
				} else {
					match format {
						FormatName::Png => encode_png(view)?,
						FormatName::Jpeg => encode_jpeg(view, opts.quality.unwrap_or(75))?,
						FormatName::Png256 | FormatName::Gif | FormatName::Json => unreachable!(),
					}
				};
				tiles.get_mut(format).unwrap().insert((row, col), blob);
			}
		}
	}

	Ok(tiles)
}

/// Serializes per-sub-tile metadata to JSON blobs, `None` when the result
/// carries no metadata.
pub fn transcode_meta(result: &RenderResult) -> Result<Option<BTreeMap<(u32, u32), Blob>>> {
	let Some(meta) = &result.meta else {
		return Ok(None);
	};
	let mut blobs = BTreeMap::new();
	for (position, collection) in meta {
		let text = serde_json::to_string(collection)
			.with_context(|| format!("serializing metadata for sub-tile {position:?}"))?;
		blobs.insert(*position, Blob::from(text));
	}
	Ok(Some(blobs))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::result::empty_collection;
	use image::Rgba;

	fn checkered(alpha: u8) -> RgbaImage {
		RgbaImage::from_fn(256, 256, |x, y| {
			if (x / 16 + y / 16) % 2 == 0 {
				Rgba([250, 10, 10, 255])
			} else {
				Rgba([10, 10, 250, alpha])
			}
		})
	}

	fn result_with(view: RgbaImage) -> RenderResult {
		RenderResult::new(BTreeMap::from([((0, 0), view)]), None)
	}

	#[test]
	fn encodes_all_image_formats() {
		let formats = [
			FormatName::Png,
			FormatName::Png256,
			FormatName::Jpeg,
			FormatName::Gif,
		];
		let mut options = HashMap::new();
		options.insert(
			FormatName::Jpeg,
			FormatOptions { quality: Some(80), palette: false, sample: None },
		);
		options.insert(
			FormatName::Png256,
			FormatOptions { quality: None, palette: true, sample: None },
		);

		let tiles = transcode(&result_with(checkered(255)), 1, &formats, &options).unwrap();
		assert_eq!(tiles.len(), 4);
		for format in &formats {
			let blob = &tiles[format][&(0, 0)];
			assert!(!blob.is_empty(), "{format} produced no bytes");
		}
		// png signature, jpeg signature, gif signature
		assert_eq!(&tiles[&FormatName::Png][&(0, 0)].as_slice()[1..4], b"PNG");
		assert_eq!(&tiles[&FormatName::Png256][&(0, 0)].as_slice()[1..4], b"PNG");
		assert_eq!(&tiles[&FormatName::Gif][&(0, 0)].as_slice()[0..3], b"GIF");
		assert_eq!(&tiles[&FormatName::Jpeg][&(0, 0)].as_slice()[0..2], &[0xFF, 0xD8]);
	}

	#[test]
	fn palettized_output_round_trips_transparency() {
		// half the pixels are below the threshold: they must decode as
		// fully transparent
		let tiles = transcode(
			&result_with(checkered(30)),
			1,
			&[FormatName::Png256],
			&HashMap::new(),
		)
		.unwrap();
		let decoded = image::load_from_memory(tiles[&FormatName::Png256][&(0, 0)].as_slice())
			.unwrap()
			.to_rgba8();
		assert_eq!(decoded.get_pixel(0, 0).0[3], 255);
		assert_eq!(decoded.get_pixel(16, 0).0[3], 0);
	}

	#[test]
	fn refuses_json() {
		let err = transcode(
			&result_with(checkered(255)),
			1,
			&[FormatName::Json],
			&HashMap::new(),
		);
		assert!(err.is_err());
	}

	#[test]
	fn meta_serializes_per_sub_tile() {
		let result = RenderResult::new(
			BTreeMap::from([((0, 0), checkered(255))]),
			Some(BTreeMap::from([((0, 0), empty_collection())])),
		);
		let blobs = transcode_meta(&result).unwrap().unwrap();
		assert_eq!(
			blobs[&(0, 0)].as_str(),
			r#"{"type":"FeatureCollection","features":[]}"#
		);
	}

	#[test]
	fn missing_sub_tile_is_an_error() {
		let result = RenderResult::new(BTreeMap::new(), None);
		assert!(transcode(&result, 1, &[FormatName::Png], &HashMap::new()).is_err());
	}
}
