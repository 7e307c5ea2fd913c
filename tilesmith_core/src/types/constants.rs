/// Number of sub-tile rows/columns in a full metatile.
pub const METATILE: u32 = 8;

/// Pixel width and height of a single sub-tile.
pub const TILE_SIZE: u32 = 256;

/// Sanity limit on tile zoom. Per-style limits are enforced upstream.
pub const MAX_ZOOM: u8 = 30;

/// Highest zoom representable in the 64-bit expiry index.
pub const MAX_EXPIRY_Z: u8 = 35;
