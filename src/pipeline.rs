//! Dataset to raster conversion
//!
//! A [`MosaicPlan`] is everything known about a dataset before any tile is
//! read: the parsed index, the tile catalog, the canvas, the geotransform and
//! the decoder. Running the plan decodes tiles on the rayon pool and streams
//! them through a bounded channel to the calling thread, which is the only
//! one touching the sink.

use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::formats::tiff::{GeoTiffOptions, GeoTiffSink};
use crate::geogrid::{
    geotransform_for_index, read_index, DatasetIndex, DecodedTile, GeoTransform, MosaicPlacer,
    Placement, RowOrder, TileCatalog, TileDecoder, TileRecord, INDEX_FILE_NAME,
};
use crate::io::TileSource;
use crate::sink::{RasterSink, EPSG_WGS84};
use crate::types::{DataType, Dimensions};

/// Decoded tiles allowed in flight per decoding thread
const TILES_IN_FLIGHT_PER_THREAD: usize = 2;

/// Execution settings for a mosaic run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MosaicOptions {
    /// Size of a dedicated decoding pool; the global rayon pool when `None`
    pub threads: Option<usize>,
}

impl MosaicOptions {
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::InvalidOptions("thread count must be positive".to_string()));
        }
        Ok(())
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MosaicStats {
    pub tiles: usize,
    pub bytes_read: u64,
    pub canvas: Dimensions,
    pub elapsed: Duration,
}

/// Tile decoded off the writer thread
struct DecodedMessage {
    index: usize,
    tile: DecodedTile,
    bytes: usize,
}

/// Everything needed to mosaic one dataset
#[derive(Debug, Clone)]
pub struct MosaicPlan {
    index: DatasetIndex,
    catalog: TileCatalog,
    decoder: TileDecoder,
    placer: MosaicPlacer,
    geotransform: GeoTransform,
    sample_type: DataType,
}

impl MosaicPlan {
    /// Reads `<dir>/index`, enumerates the tiles and derives the canvas
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let index = read_index(dir.join(INDEX_FILE_NAME))?;
        index.validate()?;
        let catalog = TileCatalog::scan(dir, index.filename_digits)?;
        Self::new(index, catalog)
    }

    /// Builds a plan from an already-parsed index and catalog
    pub fn new(index: DatasetIndex, catalog: TileCatalog) -> Result<Self> {
        index.validate()?;
        catalog.validate_shape(index.tile_x, index.tile_y)?;

        let canvas = catalog.canvas();
        let row_order = RowOrder::from_dy(index.dy);
        let sample_type = index.sample_type()?;
        let decoder = TileDecoder::for_index(&index)?;
        let geotransform = geotransform_for_index(&index, canvas);

        info!(
            "Dataset: {} {} band(s), {}-byte {} words, {:?}",
            index.tile_z,
            sample_type.name(),
            index.wordsize,
            if index.signed { "signed" } else { "unsigned" },
            row_order
        );
        debug!("Geotransform {:?}", geotransform.coefficients());

        Ok(Self {
            placer: MosaicPlacer::new(row_order, canvas),
            index,
            catalog,
            decoder,
            geotransform,
            sample_type,
        })
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }

    pub fn canvas(&self) -> Dimensions {
        self.catalog.canvas()
    }

    pub fn band_count(&self) -> usize {
        self.index.tile_z
    }

    pub fn sample_type(&self) -> DataType {
        self.sample_type
    }

    pub fn geotransform(&self) -> GeoTransform {
        self.geotransform
    }

    pub fn row_order(&self) -> RowOrder {
        self.placer.row_order()
    }

    /// Destination of every tile, in catalog order
    pub fn placements(&self) -> Result<Vec<(&TileRecord, Placement)>> {
        self.catalog
            .tiles()
            .iter()
            .map(|record| {
                self.placer
                    .placement(&record.bounds)
                    .map(|placement| (record, placement))
                    .map_err(|e| e.in_tile(&record.path))
            })
            .collect()
    }

    /// Attaches georeferencing and band metadata to a sink
    pub fn configure_sink<S: RasterSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        let dims = sink.dimensions();
        if dims != self.canvas() || sink.band_count() != self.band_count() {
            return Err(Error::Sink(format!(
                "sink is {}x{} with {} bands, dataset needs {}x{} with {}",
                dims.width,
                dims.height,
                sink.band_count(),
                self.canvas().width,
                self.canvas().height,
                self.band_count()
            )));
        }

        sink.set_geotransform(self.geotransform)?;
        sink.set_spatial_reference(EPSG_WGS84)?;
        for band in 0..self.band_count() {
            sink.set_band_scale(band, self.index.scale_factor)?;
            if let Some(missing) = self.index.missing_value {
                sink.set_band_nodata(band, missing)?;
            }
        }
        Ok(())
    }

    fn decode_tile(&self, record: &TileRecord) -> Result<(DecodedTile, usize)> {
        let source = TileSource::open(&record.path)?;
        let tile = self.decoder.decode(source.bytes())?;
        Ok((tile, source.len()))
    }

    /// Decodes every tile and writes it into `sink`
    ///
    /// The first failure stops both the decoders and the writer; the sink is
    /// left unclosed for the caller to discard.
    pub fn run<S: RasterSink + ?Sized>(
        &self,
        sink: &mut S,
        options: &MosaicOptions,
    ) -> Result<MosaicStats> {
        options.validate()?;
        let started = Instant::now();
        let tiles = self.catalog.tiles();

        let pool = match options.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("geogrid-decode-{}", i))
                    .build()
                    .map_err(|e| Error::InvalidOptions(e.to_string()))?,
            ),
            None => None,
        };
        let workers = pool
            .as_ref()
            .map(|p| p.current_num_threads())
            .unwrap_or_else(rayon::current_num_threads);

        let mut placed = 0usize;
        let mut bytes_read = 0u64;

        let outcome = crossbeam::scope(|scope| -> Result<()> {
            let (tx, rx) = bounded::<Result<DecodedMessage>>(workers * TILES_IN_FLIGHT_PER_THREAD);

            let pool = pool.as_ref();
            scope.spawn(move |_| {
                let produce = move || {
                    // Err(()) only signals "stop"; the error itself was sent
                    let _ = tiles.par_iter().enumerate().try_for_each_with(
                        tx,
                        |tx, (index, record)| {
                            let message = self
                                .decode_tile(record)
                                .map(|(tile, bytes)| DecodedMessage { index, tile, bytes })
                                .map_err(|e| e.in_tile(&record.path));
                            let failed = message.is_err();
                            tx.send(message).map_err(|_| ())?;
                            if failed {
                                Err(())
                            } else {
                                Ok(())
                            }
                        },
                    );
                };
                match pool {
                    Some(pool) => pool.install(produce),
                    None => produce(),
                }
            });

            for message in rx.iter() {
                let message = message?;
                let record = &tiles[message.index];
                self.placer
                    .place(message.tile, &record.bounds, sink)
                    .map_err(|e| e.in_tile(&record.path))?;
                placed += 1;
                bytes_read += message.bytes as u64;
            }
            Ok(())
        });

        match outcome {
            Ok(result) => result?,
            Err(_) => return Err(Error::Sink("tile decoder panicked".to_string())),
        }

        let stats = MosaicStats {
            tiles: placed,
            bytes_read,
            canvas: self.canvas(),
            elapsed: started.elapsed(),
        };
        info!(
            "Placed {} tiles ({} bytes) in {:.2?}",
            stats.tiles, stats.bytes_read, stats.elapsed
        );
        Ok(stats)
    }
}

/// Converts the dataset in `dir` into a GeoTIFF at `output`
///
/// The output file only appears once every tile has been written; any
/// failure discards the partial raster.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    dir: P,
    output: Q,
    geotiff: &GeoTiffOptions,
    options: &MosaicOptions,
) -> Result<MosaicStats> {
    let plan = MosaicPlan::from_dir(dir)?;
    convert_plan(&plan, output, geotiff, options)
}

/// Writes an existing plan to a GeoTIFF at `output`
pub fn convert_plan<Q: AsRef<Path>>(
    plan: &MosaicPlan,
    output: Q,
    geotiff: &GeoTiffOptions,
    options: &MosaicOptions,
) -> Result<MosaicStats> {
    options.validate()?;
    let canvas = plan.canvas();
    let mut sink = GeoTiffSink::create(
        output,
        canvas.width,
        canvas.height,
        plan.band_count(),
        plan.sample_type(),
        *geotiff,
    )?;
    plan.configure_sink(&mut sink)?;
    let stats = plan.run(&mut sink, options)?;
    sink.close()?;
    Ok(stats)
}
