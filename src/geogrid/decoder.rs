//! GEOGRID binary tile decoding
//!
//! A tile file is a dense array of `tile_z` bands, each `tile_y + 2*tile_bdr`
//! rows of `tile_x + 2*tile_bdr` words. Every word is `wordsize` bytes,
//! optionally two's-complement signed. The word decoder is picked once per
//! dataset so the per-sample loop carries no dispatch.

use crate::error::{Error, Result};
use crate::geogrid::index::DatasetIndex;
use crate::io::ByteOrder;

/// Decodes packed words from `src` into `dst`, one word per output sample
pub type DecodeFn = fn(&[u8], &mut [i64]);

/// Interior tile shape plus border width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileShape {
    pub tile_x: usize,
    pub tile_y: usize,
    pub tile_z: usize,
    pub border: usize,
}

impl TileShape {
    pub fn new(tile_x: usize, tile_y: usize, tile_z: usize, border: usize) -> Self {
        Self { tile_x, tile_y, tile_z, border }
    }

    fn padded_x(&self) -> usize {
        self.tile_x + 2 * self.border
    }

    fn padded_y(&self) -> usize {
        self.tile_y + 2 * self.border
    }

    /// Number of words stored in one tile file, borders included
    ///
    /// `None` when the count does not fit a `usize`.
    pub fn stored_samples(&self) -> Option<usize> {
        let padded_x = self.border.checked_mul(2)?.checked_add(self.tile_x)?;
        let padded_y = self.border.checked_mul(2)?.checked_add(self.tile_y)?;
        self.tile_z.checked_mul(padded_y)?.checked_mul(padded_x)
    }
}

/// Decoded tile samples indexed `[band][row][col]`, borders removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    bands: usize,
    rows: usize,
    cols: usize,
    samples: Vec<i64>,
}

impl DecodedTile {
    /// Wraps a band-major sample buffer
    pub fn new(bands: usize, rows: usize, cols: usize, samples: Vec<i64>) -> Result<Self> {
        if samples.len() != bands * rows * cols {
            return Err(Error::TruncatedTile {
                expected: bands * rows * cols,
                actual: samples.len(),
            });
        }
        Ok(Self { bands, rows, cols, samples })
    }

    /// Returns (bands, rows, cols)
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.bands, self.rows, self.cols)
    }

    /// Samples of one band, row-major
    pub fn band(&self, band: usize) -> &[i64] {
        let len = self.rows * self.cols;
        &self.samples[band * len..(band + 1) * len]
    }

    /// Iterates over bands in order
    pub fn bands(&self) -> impl Iterator<Item = &[i64]> {
        self.samples.chunks_exact((self.rows * self.cols).max(1)).take(self.bands)
    }

    /// Returns a single sample
    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<i64> {
        if band >= self.bands || row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.samples[(band * self.rows + row) * self.cols + col])
    }

    /// Reverses row order within every band, leaving band order untouched
    pub fn flip_rows(&mut self) {
        let cols = self.cols;
        let band_len = self.rows * cols;
        if band_len == 0 {
            return;
        }
        for band in self.samples.chunks_exact_mut(band_len) {
            for top in 0..self.rows / 2 {
                let bottom = self.rows - 1 - top;
                let (upper, lower) = band.split_at_mut(bottom * cols);
                upper[top * cols..(top + 1) * cols].swap_with_slice(&mut lower[..cols]);
            }
        }
    }

    /// Consumes the tile, returning the flat band-major samples
    pub fn into_samples(self) -> Vec<i64> {
        self.samples
    }
}

/// Picks the word decoder for a dataset's word layout
pub fn select_decoder(wordsize: usize, signed: bool, order: ByteOrder) -> Result<DecodeFn> {
    let big = order == ByteOrder::BigEndian;
    let decode: DecodeFn = match (wordsize, signed, big) {
        (1, false, _) => decode_words::<1, false, true>,
        (1, true, _) => decode_words::<1, true, true>,
        (2, false, true) => decode_words::<2, false, true>,
        (2, true, true) => decode_words::<2, true, true>,
        (3, false, true) => decode_words::<3, false, true>,
        (3, true, true) => decode_words::<3, true, true>,
        (4, false, true) => decode_words::<4, false, true>,
        (4, true, true) => decode_words::<4, true, true>,
        (2, false, false) => decode_words::<2, false, false>,
        (2, true, false) => decode_words::<2, true, false>,
        (3, false, false) => decode_words::<3, false, false>,
        (3, true, false) => decode_words::<3, true, false>,
        (4, false, false) => decode_words::<4, false, false>,
        (4, true, false) => decode_words::<4, true, false>,
        _ => {
            return Err(Error::UnsupportedDataset(format!(
                "wordsize {} (expected 1-4)",
                wordsize
            )))
        }
    };
    Ok(decode)
}

fn decode_words<const N: usize, const SIGNED: bool, const BIG: bool>(src: &[u8], dst: &mut [i64]) {
    for (word, out) in src.chunks_exact(N).zip(dst.iter_mut()) {
        let mut value: u32 = 0;
        if BIG {
            for &byte in word {
                value = (value << 8) | u32::from(byte);
            }
        } else {
            for &byte in word.iter().rev() {
                value = (value << 8) | u32::from(byte);
            }
        }
        *out = if SIGNED {
            sign_extend::<N>(value)
        } else {
            i64::from(value)
        };
    }
}

#[inline(always)]
fn sign_extend<const N: usize>(value: u32) -> i64 {
    let shift = 64 - 8 * N as u32;
    (i64::from(value) << shift) >> shift
}

/// Decoder bound to one dataset's tile shape and word layout
#[derive(Clone, Copy)]
pub struct TileDecoder {
    shape: TileShape,
    wordsize: usize,
    expected_len: usize,
    decode: DecodeFn,
}

impl std::fmt::Debug for TileDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileDecoder")
            .field("shape", &self.shape)
            .field("wordsize", &self.wordsize)
            .finish()
    }
}

impl TileDecoder {
    /// Creates a decoder for an explicit tile layout
    pub fn new(shape: TileShape, wordsize: usize, signed: bool, order: ByteOrder) -> Result<Self> {
        let decode = select_decoder(wordsize, signed, order)?;
        let expected_len = shape
            .stored_samples()
            .and_then(|samples| samples.checked_mul(wordsize))
            .ok_or_else(|| {
                Error::UnsupportedDataset(format!(
                    "tile shape {}x{}x{} with border {} overflows",
                    shape.tile_x, shape.tile_y, shape.tile_z, shape.border
                ))
            })?;
        Ok(Self {
            shape,
            wordsize,
            expected_len,
            decode,
        })
    }

    /// Creates a decoder from a dataset index
    pub fn for_index(index: &DatasetIndex) -> Result<Self> {
        Self::new(
            TileShape::new(index.tile_x, index.tile_y, index.tile_z, index.tile_bdr),
            index.wordsize,
            index.signed,
            index.endian,
        )
    }

    /// Tile layout this decoder expects
    pub fn shape(&self) -> TileShape {
        self.shape
    }

    /// Exact byte length of a tile file
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Decodes a full tile payload, stripping the border
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedTile> {
        let expected = self.expected_len();
        if bytes.len() % self.wordsize != 0 || bytes.len() != expected {
            return Err(Error::TruncatedTile {
                expected,
                actual: bytes.len(),
            });
        }

        let TileShape { tile_x, tile_y, tile_z, border } = self.shape;
        let padded_x = self.shape.padded_x();
        let padded_y = self.shape.padded_y();
        let row_bytes = tile_x * self.wordsize;

        let mut samples = vec![0i64; tile_z * tile_y * tile_x];
        for band in 0..tile_z {
            for row in 0..tile_y {
                let stored_row = band * padded_y + row + border;
                let start = (stored_row * padded_x + border) * self.wordsize;
                let dst_start = (band * tile_y + row) * tile_x;
                (self.decode)(
                    &bytes[start..start + row_bytes],
                    &mut samples[dst_start..dst_start + tile_x],
                );
            }
        }

        DecodedTile::new(tile_z, tile_y, tile_x, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_be(values: &[i64], wordsize: usize) -> Vec<u8> {
        values
            .iter()
            .flat_map(|&v| {
                let bytes = (v as u64).to_be_bytes();
                bytes[8 - wordsize..].to_vec()
            })
            .collect()
    }

    fn decode_flat(bytes: &[u8], wordsize: usize, signed: bool) -> Vec<i64> {
        let count = bytes.len() / wordsize;
        let decoder = TileDecoder::new(
            TileShape::new(count, 1, 1, 0),
            wordsize,
            signed,
            ByteOrder::BigEndian,
        )
        .unwrap();
        decoder.decode(bytes).unwrap().into_samples()
    }

    #[test]
    fn test_signed_16_bit_boundaries() {
        let bytes = [0x80, 0x00, 0xFF, 0xFF, 0x7F, 0xFF, 0x00, 0x01];
        assert_eq!(decode_flat(&bytes, 2, true), vec![-32768, -1, 32767, 1]);
    }

    #[test]
    fn test_unsigned_16_bit_keeps_high_values() {
        let bytes = [0x80, 0x00, 0xFF, 0xFF];
        assert_eq!(decode_flat(&bytes, 2, false), vec![32768, 65535]);
    }

    #[test]
    fn test_every_word_size_reproduces_values() {
        for wordsize in 1..=4usize {
            let bits = 8 * wordsize as u32;
            let signed_values = vec![
                -(1i64 << (bits - 1)),
                -1,
                0,
                1,
                (1i64 << (bits - 1)) - 1,
            ];
            let bytes = encode_be(&signed_values, wordsize);
            assert_eq!(decode_flat(&bytes, wordsize, true), signed_values, "signed {}", wordsize);

            let unsigned_values = vec![0, 1, (1i64 << (bits - 1)), (1i64 << bits) - 1];
            let bytes = encode_be(&unsigned_values, wordsize);
            assert_eq!(decode_flat(&bytes, wordsize, false), unsigned_values, "unsigned {}", wordsize);
        }
    }

    #[test]
    fn test_three_byte_words() {
        let bytes = [0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFE];
        assert_eq!(decode_flat(&bytes, 3, false), vec![0x010203, 0xFFFFFE]);
        assert_eq!(decode_flat(&bytes, 3, true), vec![0x010203, -2]);
    }

    #[test]
    fn test_little_endian_words() {
        let decoder = TileDecoder::new(
            TileShape::new(2, 1, 1, 0),
            2,
            true,
            ByteOrder::LittleEndian,
        )
        .unwrap();
        let tile = decoder.decode(&[0x00, 0x80, 0x34, 0x12]).unwrap();
        assert_eq!(tile.band(0), &[-32768, 0x1234]);
    }

    #[test]
    fn test_border_is_stripped() {
        // 4x4 stored tile, interior is the center 2x2 block
        #[rustfmt::skip]
        let bytes = [
            9, 9, 9, 9,
            9, 1, 2, 9,
            9, 3, 4, 9,
            9, 9, 9, 9,
        ];
        let decoder = TileDecoder::new(TileShape::new(2, 2, 1, 1), 1, false, ByteOrder::BigEndian).unwrap();
        let tile = decoder.decode(&bytes).unwrap();
        assert_eq!(tile.dims(), (1, 2, 2));
        assert_eq!(tile.band(0), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_border_stripped_per_band() {
        let mut bytes = vec![0u8; 2 * 4 * 4];
        for band in 0..2u8 {
            for row in 1..3 {
                for col in 1..3 {
                    bytes[(band as usize * 4 + row) * 4 + col] = 10 * (band + 1) + (row * 2 + col) as u8;
                }
            }
        }
        let decoder = TileDecoder::new(TileShape::new(2, 2, 2, 1), 1, false, ByteOrder::BigEndian).unwrap();
        let tile = decoder.decode(&bytes).unwrap();
        assert_eq!(tile.band(0), &[13, 14, 15, 16]);
        assert_eq!(tile.band(1), &[23, 24, 25, 26]);
        assert_eq!(tile.get(1, 1, 0), Some(25));
        assert_eq!(tile.get(2, 0, 0), None);
    }

    #[test]
    fn test_wrong_length_is_truncated() {
        let decoder = TileDecoder::new(TileShape::new(2, 2, 1, 0), 2, false, ByteOrder::BigEndian).unwrap();
        assert_eq!(decoder.expected_len(), 8);
        assert!(matches!(
            decoder.decode(&[0u8; 7]),
            Err(Error::TruncatedTile { expected: 8, actual: 7 })
        ));
        assert!(matches!(
            decoder.decode(&[0u8; 10]),
            Err(Error::TruncatedTile { expected: 8, actual: 10 })
        ));
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let shape = TileShape::new(2, 2, 1 << 62, 0);
        assert_eq!(shape.stored_samples(), None);
        assert!(matches!(
            TileDecoder::new(shape, 1, false, ByteOrder::BigEndian),
            Err(Error::UnsupportedDataset(_))
        ));
        let shape = TileShape::new(1 << 31, 1 << 31, 1, 0);
        assert_eq!(shape.stored_samples(), Some(1 << 62));
        assert!(matches!(
            TileDecoder::new(shape, 4, false, ByteOrder::BigEndian),
            Err(Error::UnsupportedDataset(_))
        ));
    }

    #[test]
    fn test_unsupported_word_size() {
        assert!(matches!(
            select_decoder(5, false, ByteOrder::BigEndian),
            Err(Error::UnsupportedDataset(_))
        ));
    }

    #[test]
    fn test_flip_rows() {
        let mut tile = DecodedTile::new(2, 3, 2, (0..12).collect()).unwrap();
        tile.flip_rows();
        assert_eq!(tile.band(0), &[4, 5, 2, 3, 0, 1]);
        assert_eq!(tile.band(1), &[10, 11, 8, 9, 6, 7]);
    }

    #[test]
    fn test_bands_iterator() {
        let tile = DecodedTile::new(3, 1, 2, (0..6).collect()).unwrap();
        let bands: Vec<&[i64]> = tile.bands().collect();
        assert_eq!(bands, vec![&[0, 1][..], &[2, 3][..], &[4, 5][..]]);
    }
}
