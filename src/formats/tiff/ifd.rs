//! Image File Directory (IFD) construction
//!
//! Entries are kept sorted by tag, as TIFF readers require. Values wider
//! than the inline slot (4 bytes classic, 8 bytes BigTIFF) are stored right
//! after the directory, each starting on a word boundary.

use std::collections::BTreeMap;
use std::io;

use serde::Serialize;

use super::tags::field_types;
use crate::error::{Error, Result};
use crate::io::byte_order::ByteOrderHandler;

/// TIFF file flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TiffVariant {
    /// 32-bit offsets, magic 42
    Classic,
    /// 64-bit offsets, magic 43
    BigTiff,
}

impl TiffVariant {
    /// Version number following the byte order mark
    pub fn magic(&self) -> u16 {
        match self {
            TiffVariant::Classic => super::TIFF_MAGIC,
            TiffVariant::BigTiff => super::BIGTIFF_MAGIC,
        }
    }

    /// Size of the file header in bytes
    pub fn header_len(&self) -> u64 {
        match self {
            TiffVariant::Classic => 8,
            TiffVariant::BigTiff => 16,
        }
    }

    /// Bytes available for a value inside a directory entry
    pub fn inline_len(&self) -> usize {
        match self {
            TiffVariant::Classic => 4,
            TiffVariant::BigTiff => 8,
        }
    }

    /// Size of the directory itself: entry count, entries, next offset
    pub fn directory_len(&self, entries: usize) -> u64 {
        let n = entries as u64;
        match self {
            TiffVariant::Classic => 2 + 12 * n + 4,
            TiffVariant::BigTiff => 8 + 20 * n + 8,
        }
    }

    /// Largest file offset this variant can address
    pub fn max_offset(&self) -> u64 {
        match self {
            TiffVariant::Classic => u32::MAX as u64,
            TiffVariant::BigTiff => u64::MAX,
        }
    }

    /// Wraps a list of file offsets or byte counts in the variant's type
    pub fn offsets(&self, values: &[u64]) -> Result<TagValue> {
        match self {
            TiffVariant::BigTiff => Ok(TagValue::Long8(values.to_vec())),
            TiffVariant::Classic => values
                .iter()
                .map(|&v| {
                    u32::try_from(v).map_err(|_| {
                        Error::Sink(format!("offset {} does not fit classic TIFF", v))
                    })
                })
                .collect::<Result<Vec<u32>>>()
                .map(TagValue::Long),
        }
    }

    fn write_offset(
        &self,
        handler: &dyn ByteOrderHandler,
        out: &mut Vec<u8>,
        value: u64,
    ) -> io::Result<()> {
        match self {
            TiffVariant::Classic => {
                let value = u32::try_from(value).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds 32 bits")
                })?;
                handler.write_u32(out, value)
            }
            TiffVariant::BigTiff => handler.write_u64(out, value),
        }
    }
}

/// Typed value of a directory entry
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Double(Vec<f64>),
    /// Stored with a trailing NUL
    Ascii(String),
}

impl TagValue {
    /// TIFF field type code
    pub fn field_type(&self) -> u16 {
        match self {
            TagValue::Short(_) => field_types::SHORT,
            TagValue::Long(_) => field_types::LONG,
            TagValue::Long8(_) => field_types::LONG8,
            TagValue::Double(_) => field_types::DOUBLE,
            TagValue::Ascii(_) => field_types::ASCII,
        }
    }

    /// Number of values, including the NUL of ASCII strings
    pub fn count(&self) -> u64 {
        match self {
            TagValue::Short(v) => v.len() as u64,
            TagValue::Long(v) => v.len() as u64,
            TagValue::Long8(v) => v.len() as u64,
            TagValue::Double(v) => v.len() as u64,
            TagValue::Ascii(s) => s.len() as u64 + 1,
        }
    }

    /// Size of the encoded value in bytes
    pub fn byte_len(&self) -> usize {
        self.count() as usize * IFDEntry::type_size(self.field_type())
    }

    fn encode(&self, handler: &dyn ByteOrderHandler, out: &mut Vec<u8>) -> io::Result<()> {
        match self {
            TagValue::Short(values) => values.iter().try_for_each(|&v| handler.write_u16(out, v)),
            TagValue::Long(values) => values.iter().try_for_each(|&v| handler.write_u32(out, v)),
            TagValue::Long8(values) => values.iter().try_for_each(|&v| handler.write_u64(out, v)),
            TagValue::Double(values) => values.iter().try_for_each(|&v| handler.write_f64(out, v)),
            TagValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
                Ok(())
            }
        }
    }
}

/// A single directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct IFDEntry<'a> {
    /// TIFF tag identifier
    pub tag: u16,
    pub value: &'a TagValue,
}

impl IFDEntry<'_> {
    /// Returns the size in bytes of a field type
    pub fn type_size(field_type: u16) -> usize {
        match field_type {
            field_types::ASCII => 1,
            field_types::SHORT => 2,
            field_types::LONG => 4,
            field_types::DOUBLE | field_types::LONG8 => 8,
            _ => 1,
        }
    }

    /// Returns whether the value fits in the entry's value slot
    pub fn is_inline(&self, variant: TiffVariant) -> bool {
        self.value.byte_len() <= variant.inline_len()
    }
}

/// Directory under construction
#[derive(Debug, Clone, Default)]
pub struct IFD {
    entries: BTreeMap<u16, TagValue>,
}

impl IFD {
    /// Creates an empty IFD
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a tag, replacing any previous value
    pub fn set(&mut self, tag: u16, value: TagValue) {
        self.entries.insert(tag, value);
    }

    /// Gets the value of a tag
    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.get(&tag)
    }

    /// Returns number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in ascending tag order
    pub fn entries(&self) -> impl Iterator<Item = IFDEntry<'_>> {
        self.entries.iter().map(|(&tag, value)| IFDEntry { tag, value })
    }

    /// Size of the directory plus its out-of-line values
    pub fn encoded_len(&self, variant: TiffVariant) -> u64 {
        let mut len = variant.directory_len(self.entry_count());
        for entry in self.entries() {
            if !entry.is_inline(variant) {
                len += len % 2;
                len += entry.value.byte_len() as u64;
            }
        }
        len
    }

    /// Encodes the directory as it will sit at `ifd_offset` in the file
    ///
    /// `ifd_offset` must be even; the next-IFD pointer is written as zero.
    pub fn encode(
        &self,
        ifd_offset: u64,
        variant: TiffVariant,
        handler: &dyn ByteOrderHandler,
    ) -> Result<Vec<u8>> {
        let dir_len = variant.directory_len(self.entry_count());
        let data_start = ifd_offset + dir_len;
        if data_start + self.encoded_len(variant) > variant.max_offset() {
            return Err(Error::Sink(format!(
                "directory at offset {} does not fit a {:?} file",
                ifd_offset, variant
            )));
        }

        let mut dir = Vec::with_capacity(dir_len as usize);
        let mut overflow = Vec::new();
        let inline_len = variant.inline_len();

        match variant {
            TiffVariant::Classic => handler.write_u16(&mut dir, self.entry_count() as u16),
            TiffVariant::BigTiff => handler.write_u64(&mut dir, self.entry_count() as u64),
        }
        .map_err(Error::SinkIo)?;

        for entry in self.entries() {
            let mut bytes = Vec::with_capacity(entry.value.byte_len().max(inline_len));
            entry.value.encode(handler, &mut bytes).map_err(Error::SinkIo)?;

            handler.write_u16(&mut dir, entry.tag).map_err(Error::SinkIo)?;
            handler
                .write_u16(&mut dir, entry.value.field_type())
                .map_err(Error::SinkIo)?;
            variant
                .write_offset(handler, &mut dir, entry.value.count())
                .map_err(Error::SinkIo)?;

            if bytes.len() <= inline_len {
                bytes.resize(inline_len, 0);
                dir.extend_from_slice(&bytes);
            } else {
                if overflow.len() % 2 == 1 {
                    overflow.push(0);
                }
                let offset = data_start + overflow.len() as u64;
                variant
                    .write_offset(handler, &mut dir, offset)
                    .map_err(Error::SinkIo)?;
                overflow.extend_from_slice(&bytes);
            }
        }
        variant.write_offset(handler, &mut dir, 0).map_err(Error::SinkIo)?;

        dir.extend_from_slice(&overflow);
        Ok(dir)
    }
}
