//! Memory-mapped access to GEOGRID tile files

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

/// Read-only view of one tile file's bytes
///
/// Tiles are read exactly once, front to back, so the mapping is advised
/// sequential on unix. Empty files are not mapped.
pub struct TileSource {
    mmap: Option<Mmap>,
}

impl TileSource {
    /// Maps a tile file into memory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None });
        }

        // SAFETY: tile files are treated as immutable inputs for the run.
        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(unix)]
        unsafe {
            libc::madvise(
                mmap.as_ptr() as *mut libc::c_void,
                mmap.len(),
                libc::MADV_SEQUENTIAL,
            );
        }

        Ok(Self { mmap: Some(mmap) })
    }

    /// Returns the raw tile payload
    pub fn bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    /// Returns the payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Returns true when the tile file is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        file.flush().unwrap();

        let source = TileSource::open(file.path()).unwrap();
        assert_eq!(source.bytes(), &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn test_open_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = TileSource::open(file.path()).unwrap();
        assert!(source.is_empty());
        assert_eq!(source.bytes(), &[] as &[u8]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TileSource::open(dir.path().join("00001-00002.00001-00002"));
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }
}
