//! The renderer contract and the engine seams.
//!
//! Every node of the composition graph implements [`Renderer`]: one async
//! `process` call per metatile. `Ok(None)` means "nothing to produce here"
//! and is a normal outcome that combinators may substitute for; `Err` is a
//! real failure that propagates.
//!
//! The actual rasterization engines (the vector map renderer and the native
//! tiling service) live outside this system; [`VectorEngine`] and
//! [`TilingEngine`] are the named interfaces the primitive renderers call.

use crate::result::RenderResult;
use crate::tile::RenderTile;
use anyhow::Result;
use async_trait::async_trait;
use geojson::FeatureCollection;
use image::RgbaImage;
use serde_json::Value;
use tilesmith_core::{GeoBBox, LatLng};

#[async_trait]
pub trait Renderer: Send + Sync {
	async fn process(&self, tile: &RenderTile) -> Result<Option<RenderResult>>;
}

/// What a vector rasterization produces: pixels plus the features the
/// engine's search plugin saw while drawing.
pub struct VectorRendering {
	pub image: RgbaImage,
	pub features: Option<FeatureCollection>,
}

/// Seam to the vector map rasterizer. A style is addressed by the name it
/// was registered under (usually a stylesheet path).
#[async_trait]
pub trait VectorEngine: Send + Sync {
	async fn render(
		&self,
		style: &str,
		bbox: &GeoBBox,
		width: u32,
		height: u32,
	) -> Result<VectorRendering>;
}

/// One native tiling call: style strings plus search results in, raw RGBA
/// plus POI metadata out.
pub struct TilingRequest {
	pub styles: Vec<String>,
	pub pois: Value,
	pub bbox: GeoBBox,
	pub center: LatLng,
	pub width: u32,
	pub height: u32,
	pub scale: u64,
}

pub struct TilingResponse {
	/// Tightly packed RGBA, `width * height * 4` bytes.
	pub rgba: Vec<u8>,
	pub metadata: Option<Value>,
}

/// Seam to the external map-composition service.
#[async_trait]
pub trait TilingEngine: Send + Sync {
	async fn tile(&self, request: &TilingRequest) -> Result<TilingResponse>;
}
