//! Core types shared by the tilesmith stack: coordinates, metatile math,
//! formats, jobs, projection and binary IO helpers.

pub mod geo;
pub mod io;
pub mod morton;
pub mod types;
pub mod utils;

pub use geo::*;
pub use types::*;
