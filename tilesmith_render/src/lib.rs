//! The renderer composition graph: primitive renderers that produce pixels,
//! combinators that stitch them together, the factory that builds a tree
//! per style, and the transcoder that turns rasters into wire formats.

pub mod coverage;
pub mod factory;
pub mod meta;
pub mod renderers;
pub mod result;
pub mod testing;
pub mod tile;
pub mod traits;
pub mod transcode;

pub use factory::{
	FactoryConfig, FactoryDependencies, RegionSpec, RendererFactory, RendererRegistry, StyleSpec,
	StyleSystem,
};
pub use result::RenderResult;
pub use tile::RenderTile;
pub use traits::{Renderer, TilingEngine, TilingRequest, TilingResponse, VectorEngine, VectorRendering};
pub use transcode::{FormatOptions, transcode, transcode_meta};
