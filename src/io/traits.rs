//! Core I/O traits

use std::io::{Seek, Write};

/// Trait for writers that support both writing and seeking operations
///
/// The GeoTIFF encoder writes block data first and patches the header
/// offset once the directory position is known, so it needs both.
/// Automatically implemented for any [`Write`] + [`Seek`] + [`Send`] type.
pub trait SeekableWriter: Write + Seek + Send {}

impl<T: Write + Seek + Send> SeekableWriter for T {}
