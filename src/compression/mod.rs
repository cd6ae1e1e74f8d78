//! Block compression for raster output

pub mod deflate;
pub mod lzw;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Result;

/// Compression applied to each output block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Blocks stored as-is
    None,
    /// TIFF LZW, compression 5
    Lzw,
    /// zlib-wrapped Deflate, TIFF compression 8
    #[default]
    Deflate,
}

impl Compression {
    /// Returns the TIFF Compression tag value
    pub fn tag_value(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
            Compression::Deflate => 8,
        }
    }

    /// Returns the name of this compression type
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lzw => "lzw",
            Compression::Deflate => "deflate",
        }
    }

    /// Compresses one block
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lzw => lzw::compress(data),
            Compression::Deflate => deflate::compress(data),
        }
    }

    /// Largest size a `raw`-byte block can take once compressed
    pub fn max_encoded_len(&self, raw: u64) -> u64 {
        match self {
            Compression::None => raw,
            // 12-bit codes for every byte, plus clear codes and the end code
            Compression::Lzw => raw + raw / 2 + raw / 2048 + 16,
            // zlib's compressBound
            Compression::Deflate => raw + (raw >> 12) + (raw >> 14) + (raw >> 25) + 13,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "lzw" => Ok(Compression::Lzw),
            "deflate" | "zip" => Ok(Compression::Deflate),
            other => Err(format!("unknown compression '{}' (expected none, lzw or deflate)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_tag_value() {
        assert_eq!(Compression::None.tag_value(), 1);
        assert_eq!(Compression::Lzw.tag_value(), 5);
        assert_eq!(Compression::Deflate.tag_value(), 8);
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("DEFLATE".parse::<Compression>().unwrap(), Compression::Deflate);
        assert_eq!("zip".parse::<Compression>().unwrap(), Compression::Deflate);
        assert_eq!("LZW".parse::<Compression>().unwrap(), Compression::Lzw);
        assert!("jpeg".parse::<Compression>().is_err());
    }

    #[test]
    fn test_no_compression() {
        let data = vec![1u8, 2, 3, 4];
        assert_eq!(Compression::None.compress(&data).unwrap(), data);
        assert_eq!(Compression::default(), Compression::Deflate);
    }

    #[test]
    fn test_max_encoded_len_covers_incompressible_blocks() {
        // xorshift noise does not compress
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let noise: Vec<u8> = (0..64 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        for compression in [Compression::None, Compression::Lzw, Compression::Deflate] {
            let encoded = compression.compress(&noise).unwrap();
            assert!(encoded.len() as u64 <= compression.max_encoded_len(noise.len() as u64));
        }
        assert!(Compression::Deflate.max_encoded_len(65536) > 65536);
    }
}
