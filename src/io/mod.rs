//! I/O utilities for geogrid-mosaic
//!
//! Byte-order aware encoding, memory-mapped tile access and the writer
//! bound used by the GeoTIFF encoder.

pub mod traits;
pub mod byte_order;
pub mod tile_source;

pub use traits::SeekableWriter;
pub use byte_order::ByteOrder;
pub use tile_source::TileSource;
