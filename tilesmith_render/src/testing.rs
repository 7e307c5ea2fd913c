//! Test doubles for the engine seams and small fixtures used across the
//! crate's tests. The engines are also handy for driving the worker in
//! integration tests without a real rasterizer.

use crate::result::RenderResult;
use crate::tile::RenderTile;
use crate::traits::{
	Renderer, TilingEngine, TilingRequest, TilingResponse, VectorEngine, VectorRendering,
};
use anyhow::Result;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tilesmith_core::{Mercator, MetatileCoord, TileCoord};

/// A render tile for the metatile containing `(z, x, y)`.
pub fn solid_tile(z: u8, x: u32, y: u32) -> RenderTile {
	let projection = Arc::new(Mercator::new(31));
	let coord = TileCoord { x, y, z };
	RenderTile::from_metatile("map", &MetatileCoord::from_tile(&coord), projection).unwrap()
}

/// Renders every sub-tile in one color.
pub struct SolidRenderer {
	color: Rgba<u8>,
}

impl SolidRenderer {
	pub fn new(color: Rgba<u8>) -> SolidRenderer {
		SolidRenderer { color }
	}
}

#[async_trait]
impl Renderer for SolidRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		let image = RgbaImage::from_pixel(tile.pixels, tile.pixels, self.color);
		Ok(Some(RenderResult::from_image(tile, &image, None)?))
	}
}

/// A solid renderer that counts its invocations.
pub struct CountingRenderer {
	inner: SolidRenderer,
	invocations: AtomicUsize,
}

impl CountingRenderer {
	pub fn new(color: Rgba<u8>) -> CountingRenderer {
		CountingRenderer {
			inner: SolidRenderer::new(color),
			invocations: AtomicUsize::new(0),
		}
	}

	pub fn invocations(&self) -> usize {
		self.invocations.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Renderer for CountingRenderer {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>> {
		self.invocations.fetch_add(1, Ordering::SeqCst);
		self.inner.process(tile).await
	}
}

/// A vector engine that fills the canvas with a color derived from the
/// style name, so different styles are distinguishable in assertions.
#[derive(Default)]
pub struct FlatVectorEngine;

impl FlatVectorEngine {
	fn color_for(style: &str) -> Rgba<u8> {
		let sum: u32 = style.bytes().map(u32::from).sum();
		Rgba([(sum % 251) as u8, (sum / 3 % 251) as u8, (sum / 7 % 251) as u8, 255])
	}
}

#[async_trait]
impl VectorEngine for FlatVectorEngine {
	async fn render(
		&self,
		style: &str,
		_bbox: &tilesmith_core::GeoBBox,
		width: u32,
		height: u32,
	) -> Result<VectorRendering> {
		Ok(VectorRendering {
			image: RgbaImage::from_pixel(width, height, Self::color_for(style)),
			features: None,
		})
	}
}

/// A tiling engine that answers with a fixed color and fixed metadata.
pub struct StaticTilingEngine {
	pub color: Rgba<u8>,
	pub metadata: Option<serde_json::Value>,
}

#[async_trait]
impl TilingEngine for StaticTilingEngine {
	async fn tile(&self, request: &TilingRequest) -> Result<TilingResponse> {
		let pixels = (request.width * request.height) as usize;
		let mut rgba = Vec::with_capacity(pixels * 4);
		for _ in 0..pixels {
			rgba.extend_from_slice(&self.color.0);
		}
		Ok(TilingResponse {
			rgba,
			metadata: self.metadata.clone(),
		})
	}
}
