//! Tiled GeoTIFF writer
//!
//! The mosaic is staged band by band in a memory-mapped scratch file. On
//! close the bands are cut into square blocks, compressed in parallel, and
//! written to a temporary file next to the destination, which is then
//! renamed into place. A sink dropped before `close` leaves nothing behind.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::geotiff;
use super::ifd::{TagValue, TiffVariant, IFD};
use super::staging::BandStaging;
use super::tags;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::geogrid::GeoTransform;
use crate::io::{ByteOrder, SeekableWriter};
use crate::sink::{RasterMetadata, RasterSink};
use crate::types::{DataType, Dimensions};

const SOFTWARE: &str = concat!("geogrid-mosaic ", env!("CARGO_PKG_VERSION"));

/// Room reserved for directory values other than the block tables
const DIRECTORY_SLACK: u64 = 64 * 1024;

/// Output settings for [`GeoTiffSink`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTiffOptions {
    /// Compression applied to every block
    pub compression: Compression,
    /// Edge length of the square internal blocks, a multiple of 16
    pub block_size: usize,
    /// Write BigTIFF even when classic offsets would do
    pub force_bigtiff: bool,
    /// Byte order of the output file
    pub byte_order: ByteOrder,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            block_size: 256,
            force_bigtiff: false,
            byte_order: ByteOrder::LittleEndian,
        }
    }
}

impl GeoTiffOptions {
    /// Checks the options against TIFF constraints
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size % 16 != 0 {
            return Err(Error::Sink(format!(
                "block size {} must be a positive multiple of 16",
                self.block_size
            )));
        }
        if self.block_size > u32::MAX as usize {
            return Err(Error::Sink(format!("block size {} too large", self.block_size)));
        }
        Ok(())
    }
}

/// Square block grid laid over the canvas
#[derive(Debug, Clone, Copy)]
struct BlockGrid {
    block: usize,
    across: usize,
    down: usize,
}

impl BlockGrid {
    fn new(dims: Dimensions, block: usize) -> Self {
        Self {
            block,
            across: dims.width.div_ceil(block),
            down: dims.height.div_ceil(block),
        }
    }

    fn count(&self) -> usize {
        self.across * self.down
    }

    /// Upper-left pixel of block `index`, blocks numbered row by row
    fn origin(&self, index: usize) -> (usize, usize) {
        ((index % self.across) * self.block, (index / self.across) * self.block)
    }
}

/// Upper bound on the classic TIFF file size for a block grid
///
/// Every block is assumed to compress as badly as `compression` allows.
fn worst_case_len(
    grid: &BlockGrid,
    band_count: usize,
    sample_size: usize,
    compression: Compression,
) -> u64 {
    let blocks = (grid.count() as u64).saturating_mul(band_count as u64);
    let raw = (grid.block as u64)
        .saturating_mul(grid.block as u64)
        .saturating_mul(sample_size as u64);
    let block_bound = compression.max_encoded_len(raw);
    TiffVariant::Classic
        .header_len()
        .saturating_add(blocks.saturating_mul(block_bound))
        .saturating_add(blocks.saturating_mul(8))
        .saturating_add(DIRECTORY_SLACK)
}

/// Raster sink producing a tiled GeoTIFF file
pub struct GeoTiffSink {
    path: PathBuf,
    temp: Option<NamedTempFile>,
    bands: BandStaging,
    metadata: RasterMetadata,
    options: GeoTiffOptions,
}

impl GeoTiffSink {
    /// Creates a sink that will write `path` on close
    ///
    /// The temporary file is created immediately in the destination
    /// directory, so an unwritable location fails here rather than after
    /// the whole mosaic has been decoded.
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: usize,
        height: usize,
        bands: usize,
        data_type: DataType,
        options: GeoTiffOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        options.validate()?;
        if width == 0 || height == 0 || bands == 0 {
            return Err(Error::Sink(format!(
                "empty raster {}x{} with {} bands",
                width, height, bands
            )));
        }
        if width > u32::MAX as usize || height > u32::MAX as usize || bands > u16::MAX as usize {
            return Err(Error::Sink(format!(
                "raster {}x{} with {} bands exceeds TIFF limits",
                width, height, bands
            )));
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".geogrid-mosaic-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(Error::SinkIo)?;
        let staging = BandStaging::create(
            &dir,
            Dimensions::new(width, height),
            bands,
            data_type,
            options.byte_order,
        )?;
        debug!("Staging {} in {}", path.display(), temp.path().display());

        info!(
            "Creating {}x{} GeoTIFF with {} {} band(s), {} compression",
            width,
            height,
            bands,
            data_type.name(),
            options.compression
        );

        Ok(Self {
            path,
            temp: Some(temp),
            bands: staging,
            metadata: RasterMetadata::new(bands),
            options,
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &GeoTiffOptions {
        &self.options
    }

    /// Classic TIFF unless forced or the largest possible file needs 64-bit offsets
    pub fn variant(&self) -> TiffVariant {
        if self.options.force_bigtiff {
            return TiffVariant::BigTiff;
        }
        let grid = BlockGrid::new(self.bands.dims(), self.options.block_size);
        let estimate = worst_case_len(
            &grid,
            self.bands.band_count(),
            self.bands.data_type().size(),
            self.options.compression,
        );
        if estimate > TiffVariant::Classic.max_offset() {
            TiffVariant::BigTiff
        } else {
            TiffVariant::Classic
        }
    }

    /// Raw bytes of one block, zero padded past the canvas edge
    fn block_bytes(&self, band: usize, grid: &BlockGrid, index: usize) -> Vec<u8> {
        let dims = self.bands.dims();
        let sample_size = self.bands.data_type().size();
        let (x0, y0) = grid.origin(index);
        let width = grid.block.min(dims.width - x0);
        let height = grid.block.min(dims.height - y0);
        let row_pad = (grid.block - width) * sample_size;

        let mut out = Vec::with_capacity(grid.block * grid.block * sample_size);
        for row in 0..height {
            out.extend_from_slice(self.bands.row(band, x0, y0 + row, width));
            out.resize(out.len() + row_pad, 0);
        }
        out.resize(grid.block * grid.block * sample_size, 0);
        out
    }

    fn build_ifd(&self, variant: TiffVariant, offsets: &[u64], counts: &[u64]) -> Result<IFD> {
        let dims = self.bands.dims();
        let bands = self.bands.band_count();
        let data_type = self.bands.data_type();
        let sample_format = if data_type.is_signed() {
            tags::SAMPLE_FORMAT_INT
        } else {
            tags::SAMPLE_FORMAT_UINT
        };
        let planar = if bands > 1 {
            tags::PLANAR_SEPARATE
        } else {
            tags::PLANAR_CONTIGUOUS
        };

        let mut ifd = IFD::new();
        ifd.set(tags::IMAGE_WIDTH, TagValue::Long(vec![dims.width as u32]));
        ifd.set(tags::IMAGE_LENGTH, TagValue::Long(vec![dims.height as u32]));
        ifd.set(
            tags::BITS_PER_SAMPLE,
            TagValue::Short(vec![(data_type.size() * 8) as u16; bands]),
        );
        ifd.set(
            tags::COMPRESSION,
            TagValue::Short(vec![self.options.compression.tag_value()]),
        );
        ifd.set(
            tags::PHOTOMETRIC_INTERPRETATION,
            TagValue::Short(vec![tags::PHOTOMETRIC_MIN_IS_BLACK]),
        );
        ifd.set(tags::SAMPLES_PER_PIXEL, TagValue::Short(vec![bands as u16]));
        ifd.set(tags::PLANAR_CONFIGURATION, TagValue::Short(vec![planar]));
        ifd.set(tags::SOFTWARE, TagValue::Ascii(SOFTWARE.to_string()));
        ifd.set(tags::TILE_WIDTH, TagValue::Long(vec![self.options.block_size as u32]));
        ifd.set(tags::TILE_LENGTH, TagValue::Long(vec![self.options.block_size as u32]));
        ifd.set(tags::TILE_OFFSETS, variant.offsets(offsets)?);
        ifd.set(tags::TILE_BYTE_COUNTS, variant.offsets(counts)?);
        if bands > 1 {
            // unspecified extra samples
            ifd.set(tags::EXTRA_SAMPLES, TagValue::Short(vec![0; bands - 1]));
        }
        ifd.set(tags::SAMPLE_FORMAT, TagValue::Short(vec![sample_format; bands]));

        geotiff::apply_metadata(&mut ifd, &self.metadata);
        Ok(ifd)
    }

    /// Encodes the complete file into `writer`, returning the variant used
    ///
    /// Layout: header, blocks (band-major, row-major within a band),
    /// directory, out-of-line directory values.
    pub fn encode_to<W: SeekableWriter>(&self, writer: &mut W) -> Result<TiffVariant> {
        let variant = self.variant();
        let order = self.options.byte_order;
        let handler = order.handler();
        let grid = BlockGrid::new(self.bands.dims(), self.options.block_size);
        let compression = self.options.compression;

        writer.seek(SeekFrom::Start(0)).map_err(Error::SinkIo)?;
        writer
            .write_all(&vec![0u8; variant.header_len() as usize])
            .map_err(Error::SinkIo)?;
        let mut position = variant.header_len();

        let total = grid.count() * self.bands.band_count();
        let mut offsets = Vec::with_capacity(total);
        let mut counts = Vec::with_capacity(total);

        for band in 0..self.bands.band_count() {
            let blocks = (0..grid.count())
                .into_par_iter()
                .map(|index| compression.compress(&self.block_bytes(band, &grid, index)))
                .collect::<Result<Vec<Vec<u8>>>>()?;

            for block in blocks {
                offsets.push(position);
                counts.push(block.len() as u64);
                writer.write_all(&block).map_err(Error::SinkIo)?;
                position += block.len() as u64;
            }
            debug!("Wrote band {} as {} blocks", band + 1, grid.count());
        }

        if position % 2 == 1 {
            writer.write_all(&[0]).map_err(Error::SinkIo)?;
            position += 1;
        }

        let ifd = self.build_ifd(variant, &offsets, &counts)?;
        for entry in ifd.entries() {
            debug!(
                "  {} ({}) {} x{}",
                tags::tag_name(entry.tag),
                entry.tag,
                tags::field_type_name(entry.value.field_type()),
                entry.value.count()
            );
        }
        let directory = ifd.encode(position, variant, handler.as_ref())?;
        writer.write_all(&directory).map_err(Error::SinkIo)?;

        let mut header = Vec::with_capacity(variant.header_len() as usize);
        header.extend_from_slice(&order.tiff_magic());
        handler
            .write_u16(&mut header, variant.magic())
            .map_err(Error::SinkIo)?;
        match variant {
            TiffVariant::Classic => {
                let offset = u32::try_from(position).map_err(|_| {
                    Error::Sink(format!("directory offset {} exceeds classic TIFF", position))
                })?;
                handler.write_u32(&mut header, offset)
            }
            TiffVariant::BigTiff => handler
                .write_u16(&mut header, 8)
                .and_then(|_| handler.write_u16(&mut header, 0))
                .and_then(|_| handler.write_u64(&mut header, position)),
        }
        .map_err(Error::SinkIo)?;

        writer.seek(SeekFrom::Start(0)).map_err(Error::SinkIo)?;
        writer.write_all(&header).map_err(Error::SinkIo)?;
        writer.seek(SeekFrom::End(0)).map_err(Error::SinkIo)?;
        writer.flush().map_err(Error::SinkIo)?;

        Ok(variant)
    }
}

impl RasterSink for GeoTiffSink {
    fn dimensions(&self) -> Dimensions {
        self.bands.dims()
    }

    fn band_count(&self) -> usize {
        self.bands.band_count()
    }

    fn data_type(&self) -> DataType {
        self.bands.data_type()
    }

    fn set_geotransform(&mut self, transform: GeoTransform) -> Result<()> {
        self.metadata.geotransform = Some(transform);
        Ok(())
    }

    fn set_spatial_reference(&mut self, epsg: u16) -> Result<()> {
        if !geotiff::is_geographic_epsg(epsg) {
            return Err(Error::Sink(format!("EPSG:{} is not a geographic CRS", epsg)));
        }
        self.metadata.epsg = Some(epsg);
        Ok(())
    }

    fn set_band_scale(&mut self, band: usize, scale: f64) -> Result<()> {
        self.metadata.set_band_scale(band, scale)
    }

    fn set_band_nodata(&mut self, band: usize, value: f64) -> Result<()> {
        self.metadata.set_band_nodata(band, value)
    }

    fn write_block(
        &mut self,
        band: usize,
        x_off: usize,
        y_off: usize,
        width: usize,
        height: usize,
        samples: &[i64],
    ) -> Result<()> {
        self.bands.write_block(band, x_off, y_off, width, height, samples)
    }

    fn close(mut self) -> Result<()> {
        let mut temp = self
            .temp
            .take()
            .ok_or_else(|| Error::Sink("raster already closed".to_string()))?;

        let variant = {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.encode_to(&mut writer)?
        };
        temp.as_file().sync_all().map_err(Error::SinkIo)?;
        let file: File = temp.persist(&self.path).map_err(|e| Error::SinkIo(e.error))?;
        let size = file.metadata().map_err(Error::SinkIo)?.len();

        info!(
            "Wrote {} ({:?}, {} bytes)",
            self.path.display(),
            variant,
            size
        );
        Ok(())
    }
}

impl Drop for GeoTiffSink {
    fn drop(&mut self) {
        if self.temp.is_some() {
            warn!("Discarding unfinished raster {}", self.path.display());
        }
    }
}
