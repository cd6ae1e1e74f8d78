//! WPS GEOGRID static dataset support
//!
//! A dataset directory holds an `index` metadata file and a set of
//! fixed-size binary tiles. These modules turn it into placements on a
//! single georeferenced canvas.

pub mod index;
pub mod catalog;
pub mod decoder;
pub mod placement;
pub mod geotransform;

pub use index::{read_index, parse_index, DatasetIndex, DatasetKind, IndexValue, Projection, INDEX_FILE_NAME};
pub use catalog::{parse_tile_name, TileBounds, TileCatalog, TileRecord};
pub use decoder::{select_decoder, DecodeFn, DecodedTile, TileDecoder, TileShape};
pub use placement::{MosaicPlacer, Placement, RowOrder};
pub use geotransform::{build_geotransform, geotransform_for_index, Affine, GeoTransform, KnownPoint};
