//! TIFF and BigTIFF output

pub mod tags;
pub mod ifd;
pub mod geotiff;
pub mod staging;
pub mod writer;

pub use ifd::{IFDEntry, TagValue, TiffVariant, IFD};
pub use writer::{GeoTiffOptions, GeoTiffSink};

/// TIFF magic number (42)
pub const TIFF_MAGIC: u16 = 42;

/// BigTIFF magic number (43)
pub const BIGTIFF_MAGIC: u16 = 43;
