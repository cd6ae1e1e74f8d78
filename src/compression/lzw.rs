//! LZW compression
//!
//! TIFF LZW codes are packed most significant bit first and widen one code
//! early, which `weezl` calls the TIFF size switch.

use weezl::encode::Encoder;
use weezl::BitOrder;

use crate::error::{Error, Result};

/// Compresses a block as TIFF compression 5 expects
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(data)
        .map_err(|e| Error::Sink(format!("LZW compression failed: {}", e)))
}
