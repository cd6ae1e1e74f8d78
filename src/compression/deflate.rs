//! Deflate/ZIP compression

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression as Level;

use crate::error::Result;

/// Compresses a block with zlib framing, as TIFF compression 8 expects
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Level::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_deflate_compression() {
        let original = vec![7u8; 4096];
        let compressed = compress(&original).unwrap();
        assert!(compressed.len() < original.len());

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_deflate_is_deterministic() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(compress(&data).unwrap(), compress(&data).unwrap());
    }
}
