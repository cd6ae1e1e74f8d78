//! Byte order (endianness) handling
//!
//! GEOGRID tiles declare their byte order in the index (`endian = big|little`)
//! and the GeoTIFF writer emits either "II" or "MM" files. Both sides go
//! through [`ByteOrder`].

use std::io::{Result, Write};

use serde::Serialize;

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    #[serde(rename = "little")]
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    #[serde(rename = "big")]
    BigEndian,
}

impl ByteOrder {
    /// Parses the `endian` value of a GEOGRID index
    pub fn from_index_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "big" => Some(ByteOrder::BigEndian),
            "little" => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }

    /// Returns the TIFF magic bytes announcing this byte order
    pub fn tiff_magic(&self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// Creates a handler for this byte order
    pub fn handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndian),
            ByteOrder::BigEndian => Box::new(BigEndian),
        }
    }
}

/// Trait for writing typed values with specific byte order
pub trait ByteOrderHandler: Send + Sync {
    /// Writes an unsigned 16-bit integer
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()>;

    /// Writes an unsigned 32-bit integer
    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()>;

    /// Writes an unsigned 64-bit integer
    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()>;

    /// Writes a 64-bit floating point number
    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()>;
}

struct LittleEndian;

impl ByteOrderHandler for LittleEndian {
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_all(&value.to_le_bytes())
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_all(&value.to_le_bytes())
    }

    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()> {
        writer.write_all(&value.to_le_bytes())
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_all(&value.to_le_bytes())
    }
}

struct BigEndian;

impl ByteOrderHandler for BigEndian {
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_all(&value.to_be_bytes())
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_all(&value.to_be_bytes())
    }

    fn write_u64(&self, writer: &mut dyn Write, value: u64) -> Result<()> {
        writer.write_all(&value.to_be_bytes())
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_all(&value.to_be_bytes())
    }
}
