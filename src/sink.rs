//! Output raster contract
//!
//! The mosaic pipeline never touches an output format directly. It talks to
//! a [`RasterSink`]: create it with a size, band count and sample type, attach
//! georeferencing, write rectangular blocks, then close it. [`MemorySink`]
//! keeps the mosaic in memory; the GeoTIFF sink, which stages its bands in
//! a memory-mapped scratch file, lives in [`crate::formats::tiff`].

use crate::error::{Error, Result};
use crate::geogrid::GeoTransform;
use crate::types::{DataType, Dimensions};

/// EPSG code of geographic WGS 84
pub const EPSG_WGS84: u16 = 4326;

/// Destination for decoded tile blocks
pub trait RasterSink {
    /// Canvas size in pixels
    fn dimensions(&self) -> Dimensions;

    /// Number of bands
    fn band_count(&self) -> usize;

    /// Sample type stored per pixel
    fn data_type(&self) -> DataType;

    fn set_geotransform(&mut self, transform: GeoTransform) -> Result<()>;

    fn set_spatial_reference(&mut self, epsg: u16) -> Result<()>;

    /// Sets the multiplicative scale readers apply to a band (0-based)
    fn set_band_scale(&mut self, band: usize, scale: f64) -> Result<()>;

    /// Sets the no-data sentinel of a band (0-based)
    fn set_band_nodata(&mut self, band: usize, value: f64) -> Result<()>;

    /// Places a `width` x `height` row-major block at pixel `(x_off, y_off)`
    ///
    /// Later writes overwrite earlier ones; nothing is blended.
    fn write_block(
        &mut self,
        band: usize,
        x_off: usize,
        y_off: usize,
        width: usize,
        height: usize,
        samples: &[i64],
    ) -> Result<()>;

    /// Flushes and finalizes the raster
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

trait Sample: Copy + Default {
    fn from_i64(value: i64) -> Self;
    fn to_i64(self) -> i64;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn from_i64(value: i64) -> Self {
                    value as $t
                }

                #[inline]
                fn to_i64(self) -> i64 {
                    self as i64
                }
            }
        )*
    };
}

impl_sample!(u8, u16, u32, i16, i32);

fn store<T: Sample>(dst: &mut [T], src: &[i64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::from_i64(s);
    }
}

/// One band's pixels, stored in the output sample type
#[derive(Debug, Clone, PartialEq)]
pub enum BandBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

macro_rules! with_values {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            BandBuffer::U8($values) => $body,
            BandBuffer::U16($values) => $body,
            BandBuffer::U32($values) => $body,
            BandBuffer::I16($values) => $body,
            BandBuffer::I32($values) => $body,
        }
    };
}

impl BandBuffer {
    /// Allocates a zero-filled band
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => BandBuffer::U8(vec![0; len]),
            DataType::U16 => BandBuffer::U16(vec![0; len]),
            DataType::U32 => BandBuffer::U32(vec![0; len]),
            DataType::I16 => BandBuffer::I16(vec![0; len]),
            DataType::I32 => BandBuffer::I32(vec![0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            BandBuffer::U8(_) => DataType::U8,
            BandBuffer::U16(_) => DataType::U16,
            BandBuffer::U32(_) => DataType::U32,
            BandBuffer::I16(_) => DataType::I16,
            BandBuffer::I32(_) => DataType::I32,
        }
    }

    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns one sample widened to i64
    pub fn get(&self, index: usize) -> Option<i64> {
        with_values!(self, v => v.get(index).map(|s| s.to_i64()))
    }

    /// Returns all samples widened to i64
    pub fn to_i64_vec(&self) -> Vec<i64> {
        with_values!(self, v => v.iter().map(|s| s.to_i64()).collect())
    }

    /// Overwrites `src.len()` samples starting at `start`
    fn store_run(&mut self, start: usize, src: &[i64]) {
        with_values!(self, v => store(&mut v[start..start + src.len()], src))
    }
}

/// In-memory canvas shared by the sink implementations
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    dims: Dimensions,
    data_type: DataType,
    bands: Vec<BandBuffer>,
}

impl RasterCanvas {
    pub fn new(width: usize, height: usize, band_count: usize, data_type: DataType) -> Self {
        let dims = Dimensions::new(width, height);
        let bands = (0..band_count)
            .map(|_| BandBuffer::zeroed(data_type, dims.pixel_count()))
            .collect();
        Self { dims, data_type, bands }
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, band: usize) -> Option<&BandBuffer> {
        self.bands.get(band)
    }

    /// Copies a row-major block into a band
    pub fn write_block(
        &mut self,
        band: usize,
        x_off: usize,
        y_off: usize,
        width: usize,
        height: usize,
        samples: &[i64],
    ) -> Result<()> {
        let dims = self.dims;
        check_block(dims, self.bands.len(), band, x_off, y_off, width, height, samples.len())?;
        if width == 0 {
            return Ok(());
        }

        let buffer = &mut self.bands[band];
        for (row, src) in samples.chunks_exact(width).enumerate() {
            let start = (y_off + row) * dims.width + x_off;
            buffer.store_run(start, src);
        }
        Ok(())
    }
}

/// Validates a `write_block` request against a canvas
#[allow(clippy::too_many_arguments)]
pub(crate) fn check_block(
    dims: Dimensions,
    band_count: usize,
    band: usize,
    x_off: usize,
    y_off: usize,
    width: usize,
    height: usize,
    sample_count: usize,
) -> Result<()> {
    if band >= band_count {
        return Err(Error::Sink(format!("band {} out of range ({} bands)", band, band_count)));
    }
    let fits = |off: usize, len: usize, limit: usize| off.checked_add(len).is_some_and(|end| end <= limit);
    if !fits(x_off, width, dims.width) || !fits(y_off, height, dims.height) {
        return Err(Error::Sink(format!(
            "block {}x{} at ({}, {}) exceeds canvas {}x{}",
            width, height, x_off, y_off, dims.width, dims.height
        )));
    }
    if width.checked_mul(height) != Some(sample_count) {
        return Err(Error::Sink(format!(
            "block {}x{} given {} samples",
            width, height, sample_count
        )));
    }
    Ok(())
}

/// Georeferencing and band metadata recorded by a sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterMetadata {
    pub geotransform: Option<GeoTransform>,
    pub epsg: Option<u16>,
    pub scales: Vec<Option<f64>>,
    pub nodata: Vec<Option<f64>>,
}

impl RasterMetadata {
    pub fn new(band_count: usize) -> Self {
        Self {
            geotransform: None,
            epsg: None,
            scales: vec![None; band_count],
            nodata: vec![None; band_count],
        }
    }

    pub fn set_band_scale(&mut self, band: usize, scale: f64) -> Result<()> {
        let count = self.scales.len();
        let slot = self
            .scales
            .get_mut(band)
            .ok_or_else(|| Error::Sink(format!("band {} out of range ({} bands)", band, count)))?;
        *slot = Some(scale);
        Ok(())
    }

    pub fn set_band_nodata(&mut self, band: usize, value: f64) -> Result<()> {
        let count = self.nodata.len();
        let slot = self
            .nodata
            .get_mut(band)
            .ok_or_else(|| Error::Sink(format!("band {} out of range ({} bands)", band, count)))?;
        *slot = Some(value);
        Ok(())
    }
}

/// Sink that keeps the mosaic in memory
#[derive(Debug, Clone)]
pub struct MemorySink {
    canvas: RasterCanvas,
    metadata: RasterMetadata,
}

impl MemorySink {
    pub fn new(width: usize, height: usize, band_count: usize, data_type: DataType) -> Self {
        Self {
            canvas: RasterCanvas::new(width, height, band_count, data_type),
            metadata: RasterMetadata::new(band_count),
        }
    }

    /// Samples of one band, widened to i64; empty for an unknown band
    pub fn band(&self, band: usize) -> Vec<i64> {
        self.canvas.band(band).map(BandBuffer::to_i64_vec).unwrap_or_default()
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }
}

impl RasterSink for MemorySink {
    fn dimensions(&self) -> Dimensions {
        self.canvas.dims()
    }

    fn band_count(&self) -> usize {
        self.canvas.band_count()
    }

    fn data_type(&self) -> DataType {
        self.canvas.data_type()
    }

    fn set_geotransform(&mut self, transform: GeoTransform) -> Result<()> {
        self.metadata.geotransform = Some(transform);
        Ok(())
    }

    fn set_spatial_reference(&mut self, epsg: u16) -> Result<()> {
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
        self.canvas.write_block(band, x_off, y_off, width, height, samples)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_block_places_rows() {
        let mut sink = MemorySink::new(4, 3, 1, DataType::U16);
        sink.write_block(0, 1, 1, 2, 2, &[1, 2, 3, 4]).unwrap();
        assert_eq!(sink.band(0), &[0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0]);
    }

    #[test]
    fn test_last_writer_wins() {
        let mut sink = MemorySink::new(2, 1, 1, DataType::U8);
        sink.write_block(0, 0, 0, 2, 1, &[1, 1]).unwrap();
        sink.write_block(0, 1, 0, 1, 1, &[7]).unwrap();
        assert_eq!(sink.band(0), &[1, 7]);
    }

    #[test]
    fn test_signed_samples_survive() {
        let mut sink = MemorySink::new(2, 1, 1, DataType::I16);
        sink.write_block(0, 0, 0, 2, 1, &[-32768, 32767]).unwrap();
        assert_eq!(sink.band(0), &[-32768, 32767]);
    }

    #[test]
    fn test_block_outside_canvas_fails() {
        let mut sink = MemorySink::new(2, 2, 1, DataType::U8);
        assert!(matches!(
            sink.write_block(0, 1, 0, 2, 1, &[1, 2]),
            Err(Error::Sink(_))
        ));
        assert!(matches!(
            sink.write_block(1, 0, 0, 1, 1, &[1]),
            Err(Error::Sink(_))
        ));
        assert!(matches!(
            sink.write_block(0, 0, 0, 2, 1, &[1]),
            Err(Error::Sink(_))
        ));
    }

    #[test]
    fn test_metadata_recorded() {
        let mut sink = MemorySink::new(1, 1, 2, DataType::U8);
        sink.set_spatial_reference(EPSG_WGS84).unwrap();
        sink.set_band_scale(1, 0.01).unwrap();
        sink.set_band_nodata(0, 255.0).unwrap();
        assert!(sink.set_band_scale(2, 1.0).is_err());

        let metadata = sink.metadata();
        assert_eq!(metadata.epsg, Some(4326));
        assert_eq!(metadata.scales, vec![None, Some(0.01)]);
        assert_eq!(metadata.nodata, vec![Some(255.0), None]);
    }

    #[test]
    fn test_store_run_truncates_to_sample_type() {
        let mut buffer = BandBuffer::zeroed(DataType::U16, 2);
        buffer.store_run(0, &[0x1234, 0x1ABCD]);
        assert_eq!(buffer.to_i64_vec(), vec![0x1234, 0xABCD]);
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn test_check_block_rejects_overflowing_offsets() {
        let dims = Dimensions::new(4, 4);
        assert!(check_block(dims, 1, 0, 0, 0, 4, 4, 16).is_ok());
        assert!(matches!(
            check_block(dims, 1, 0, usize::MAX, 0, 2, 1, 2),
            Err(Error::Sink(_))
        ));
        assert!(matches!(
            check_block(dims, 1, 0, 0, 0, 4, 4, 15),
            Err(Error::Sink(_))
        ));
    }
}
