mod blob;
mod byte_range;
mod constants;
mod job;
mod metatile_coord;
mod tile_coord;
mod tile_format;

pub use blob::Blob;
pub use byte_range::ByteRange;
pub use constants::*;
pub use job::{Job, JobStatus};
pub use metatile_coord::MetatileCoord;
pub use tile_coord::TileCoord;
pub use tile_format::{FormatName, TileFormat, content_type_for_extension};
