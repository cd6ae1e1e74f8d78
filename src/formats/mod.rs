//! Output raster formats

pub mod tiff;

pub use tiff::{GeoTiffOptions, GeoTiffSink};
