mod geo_bbox;
mod mercator;

pub use geo_bbox::{GeoBBox, LatLng};
pub use mercator::{Mercator, scale_denominator};
