//! Disk-backed band staging for the GeoTIFF writer
//!
//! Every band is kept as encoded sample bytes, already in the output byte
//! order, inside an anonymous scratch file mapped with `memmap2`. Blocks are
//! cut straight from the mapping on close, so the resident size of a run is
//! bounded by the page cache rather than by the band count.

use std::path::Path;

use memmap2::MmapMut;

use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::sink::check_block;
use crate::types::{DataType, Dimensions};

/// Encodes `src` into `dst`, `N` bytes per sample
#[inline]
fn put<const N: usize>(src: &[i64], dst: &mut [u8], to_bytes: impl Fn(i64) -> [u8; N]) {
    for (chunk, &value) in dst.chunks_exact_mut(N).zip(src) {
        chunk.copy_from_slice(&to_bytes(value));
    }
}

fn encode_row(data_type: DataType, order: ByteOrder, src: &[i64], dst: &mut [u8]) {
    use ByteOrder::{BigEndian as BE, LittleEndian as LE};

    match (data_type, order) {
        (DataType::U8, _) => put(src, dst, |v| [v as u8]),
        (DataType::U16, LE) => put(src, dst, |v| (v as u16).to_le_bytes()),
        (DataType::U16, BE) => put(src, dst, |v| (v as u16).to_be_bytes()),
        (DataType::U32, LE) => put(src, dst, |v| (v as u32).to_le_bytes()),
        (DataType::U32, BE) => put(src, dst, |v| (v as u32).to_be_bytes()),
        (DataType::I16, LE) => put(src, dst, |v| (v as i16).to_le_bytes()),
        (DataType::I16, BE) => put(src, dst, |v| (v as i16).to_be_bytes()),
        (DataType::I32, LE) => put(src, dst, |v| (v as i32).to_le_bytes()),
        (DataType::I32, BE) => put(src, dst, |v| (v as i32).to_be_bytes()),
    }
}

/// Bands of one raster, stored band-major in a mapped scratch file
pub struct BandStaging {
    dims: Dimensions,
    band_count: usize,
    data_type: DataType,
    order: ByteOrder,
    map: MmapMut,
}

impl BandStaging {
    /// Creates a zero-filled staging area in `dir`
    ///
    /// The scratch file is unlinked from the start and vanishes with the
    /// mapping.
    pub fn create(
        dir: &Path,
        dims: Dimensions,
        band_count: usize,
        data_type: DataType,
        order: ByteOrder,
    ) -> Result<Self> {
        let len = dims
            .pixel_count()
            .checked_mul(band_count)
            .and_then(|samples| samples.checked_mul(data_type.size()))
            .ok_or_else(|| {
                Error::Sink(format!(
                    "raster {}x{} with {} bands does not fit in memory",
                    dims.width, dims.height, band_count
                ))
            })?;

        let file = tempfile::tempfile_in(dir).map_err(Error::SinkIo)?;
        file.set_len(len as u64).map_err(Error::SinkIo)?;
        // SAFETY: the scratch file is unnamed and only reachable through
        // this mapping.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(Error::SinkIo)?;

        Ok(Self {
            dims,
            band_count,
            data_type,
            order,
            map,
        })
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Byte offset of pixel `(x, y)` in `band`
    fn offset(&self, band: usize, x: usize, y: usize) -> usize {
        ((band * self.dims.height + y) * self.dims.width + x) * self.data_type.size()
    }

    /// Encodes a row-major block into a band
    pub fn write_block(
        &mut self,
        band: usize,
        x_off: usize,
        y_off: usize,
        width: usize,
        height: usize,
        samples: &[i64],
    ) -> Result<()> {
        let count = samples.len();
        check_block(self.dims, self.band_count, band, x_off, y_off, width, height, count)?;
        if width == 0 {
            return Ok(());
        }

        let row_len = width * self.data_type.size();
        for (row, src) in samples.chunks_exact(width).enumerate() {
            let start = self.offset(band, x_off, y_off + row);
            encode_row(self.data_type, self.order, src, &mut self.map[start..start + row_len]);
        }
        Ok(())
    }

    /// Encoded bytes of `count` pixels starting at `(x, y)` in `band`
    ///
    /// The run must lie within one row of the canvas.
    pub fn row(&self, band: usize, x: usize, y: usize, count: usize) -> &[u8] {
        let start = self.offset(band, x, y);
        &self.map[start..start + count * self.data_type.size()]
    }
}
