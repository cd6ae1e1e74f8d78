//! geogrid-mosaic - WPS GEOGRID tiles to GeoTIFF
//!
//! geogrid-mosaic reads a WPS GEOGRID static dataset (an `index` metadata
//! file plus fixed-size binary tiles) and assembles the tiles into one
//! georeferenced raster.
//!
//! # Examples
//!
//! ## Converting a dataset
//!
//! ```no_run
//! use geogrid_mosaic::{convert, GeoTiffOptions, MosaicOptions};
//!
//! let stats = convert(
//!     "geog/topo_30s",
//!     "topo_30s.tif",
//!     &GeoTiffOptions::default(),
//!     &MosaicOptions::default(),
//! )?;
//! println!("{} tiles, canvas {}x{}", stats.tiles, stats.canvas.width, stats.canvas.height);
//! # Ok::<(), geogrid_mosaic::Error>(())
//! ```
//!
//! ## Mosaicking into memory
//!
//! ```no_run
//! use geogrid_mosaic::{MemorySink, MosaicOptions, MosaicPlan};
//!
//! let plan = MosaicPlan::from_dir("geog/landuse_30s")?;
//! let canvas = plan.canvas();
//! let mut sink = MemorySink::new(canvas.width, canvas.height, plan.band_count(), plan.sample_type());
//! plan.configure_sink(&mut sink)?;
//! plan.run(&mut sink, &MosaicOptions::default())?;
//!
//! let categories = sink.band(0);
//! println!("first class: {}", categories[0]);
//! # Ok::<(), geogrid_mosaic::Error>(())
//! ```

pub mod io;
pub mod error;
pub mod types;
pub mod geogrid;
pub mod sink;
pub mod compression;
pub mod formats;
pub mod pipeline;
pub mod report;
pub mod cli;

pub use error::{Error, Result};
pub use types::{DataType, Dimensions};
pub use geogrid::{DatasetIndex, GeoTransform, MosaicPlacer, RowOrder, TileCatalog, TileDecoder};
pub use sink::{MemorySink, RasterSink};
pub use compression::Compression;
pub use formats::tiff::{GeoTiffOptions, GeoTiffSink};
pub use pipeline::{convert, MosaicOptions, MosaicPlan, MosaicStats};
pub use io::ByteOrder;
