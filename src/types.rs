//! Core data types for geogrid-mosaic

use serde::Serialize;

use crate::error::{Error, Result};

/// Sample types written to the output raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
}

impl DataType {
    /// Picks the narrowest output type able to hold a GEOGRID word.
    ///
    /// Signed single-byte words widen to `I16`.
    pub fn for_word(wordsize: usize, signed: bool) -> Result<Self> {
        match (wordsize, signed) {
            (1, false) => Ok(DataType::U8),
            (2, false) => Ok(DataType::U16),
            (3 | 4, false) => Ok(DataType::U32),
            (1 | 2, true) => Ok(DataType::I16),
            (3 | 4, true) => Ok(DataType::I32),
            _ => Err(Error::UnsupportedDataset(format!(
                "wordsize {} (expected 1-4)",
                wordsize
            ))),
        }
    }

    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 => 4,
        }
    }

    /// Returns whether values of this type carry a sign
    pub fn is_signed(&self) -> bool {
        matches!(self, DataType::I16 | DataType::I32)
    }

    /// Returns the name of this data type
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "U8",
            DataType::U16 => "U16",
            DataType::U32 => "U32",
            DataType::I16 => "I16",
            DataType::I32 => "I32",
        }
    }
}

/// Pixel dimensions of the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Returns the total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}
