//! The metatile binary container and the stores that hold it: the
//! self-describing multi-format blob, the hashed on-disk directory layout,
//! and the HTTP client workers use to talk to storage nodes.

pub mod client;
pub mod directory;
pub mod metatile;

pub use client::{MetaHandle, StorageClient};
pub use directory::{TileId, TileLayout, TileStore};
pub use metatile::{MetatileReader, MetatileWriter, TileSet};
