//! Tile enumeration and canvas sizing
//!
//! GEOGRID tiles are named `XXXXX-XXXXX.YYYYY-YYYYY`: start and end column,
//! then start and end row, 1-based and inclusive, each field zero padded to
//! `filename_digits` characters.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::Dimensions;

/// Pixel range a tile covers in the global canvas, 1-based and inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileBounds {
    pub x_start: usize,
    pub x_end: usize,
    pub y_start: usize,
    pub y_end: usize,
}

impl TileBounds {
    /// Creates bounds from filename fields
    pub fn new(x_start: usize, x_end: usize, y_start: usize, y_end: usize) -> Self {
        Self { x_start, x_end, y_start, y_end }
    }

    /// Number of columns covered, 0 when the range is inverted
    pub fn width(&self) -> usize {
        (self.x_end + 1).saturating_sub(self.x_start)
    }

    /// Number of rows covered, 0 when the range is inverted
    pub fn height(&self) -> usize {
        (self.y_end + 1).saturating_sub(self.y_start)
    }
}

/// One tile file and the canvas region it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub path: PathBuf,
    pub bounds: TileBounds,
}

/// Parses a tile filename into its bounds
///
/// Returns `None` for names that do not follow the fixed-width layout, so
/// the index file and stray files in the dataset directory are skipped.
pub fn parse_tile_name(name: &str, digits: usize) -> Option<TileBounds> {
    let bytes = name.as_bytes();
    if digits == 0 || bytes.len() != 4 * digits + 3 {
        return None;
    }

    let separators = [b'-', b'.', b'-'];
    let mut fields = [0usize; 4];
    for (i, field) in fields.iter_mut().enumerate() {
        let start = i * (digits + 1);
        let text = &bytes[start..start + digits];
        if !text.iter().all(u8::is_ascii_digit) {
            return None;
        }
        if i < 3 && bytes[start + digits] != separators[i] {
            return None;
        }
        *field = std::str::from_utf8(text).ok()?.parse().ok()?;
    }

    Some(TileBounds::new(fields[0], fields[1], fields[2], fields[3]))
}

/// The set of tiles making up one dataset
#[derive(Debug, Clone)]
pub struct TileCatalog {
    root: PathBuf,
    tiles: Vec<TileRecord>,
    canvas: Dimensions,
}

impl TileCatalog {
    /// Enumerates the tile files in `dir`
    ///
    /// Records are sorted by filename so runs are reproducible; placement
    /// itself does not depend on order.
    pub fn scan<P: AsRef<Path>>(dir: P, digits: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let mut records = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(bounds) = parse_tile_name(name, digits) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            debug!("Found tile {} covering {:?}", name, bounds);
            records.push(TileRecord { path, bounds });
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Self::new(dir, records)
    }

    /// Builds a catalog from already-enumerated tiles
    pub fn new(root: impl Into<PathBuf>, tiles: Vec<TileRecord>) -> Result<Self> {
        let root = root.into();
        if tiles.is_empty() {
            return Err(Error::EmptyDataset(root));
        }

        let width = tiles.iter().map(|t| t.bounds.x_end).max().unwrap_or(0);
        let height = tiles.iter().map(|t| t.bounds.y_end).max().unwrap_or(0);
        let canvas = Dimensions::new(width, height);
        info!("Catalogued {} tiles, canvas {}x{}", tiles.len(), width, height);

        Ok(Self { root, tiles, canvas })
    }

    /// Checks every tile's range against the declared interior tile shape
    pub fn validate_shape(&self, tile_x: usize, tile_y: usize) -> Result<()> {
        for tile in &self.tiles {
            let b = tile.bounds;
            if b.x_start == 0 || b.y_start == 0 {
                return Err(Error::InvalidTileBounds(format!(
                    "{}: coordinates are 1-based",
                    tile.path.display()
                )));
            }
            if b.width() != tile_x || b.height() != tile_y {
                return Err(Error::InvalidTileBounds(format!(
                    "{}: covers {}x{} pixels, index declares {}x{}",
                    tile.path.display(),
                    b.width(),
                    b.height(),
                    tile_x,
                    tile_y
                )));
            }
        }
        Ok(())
    }

    /// Directory the tiles were found in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All tiles, sorted by path when produced by [`TileCatalog::scan`]
    pub fn tiles(&self) -> &[TileRecord] {
        &self.tiles
    }

    /// Output canvas size: the largest end column and end row
    pub fn canvas(&self) -> Dimensions {
        self.canvas
    }

    /// Number of tiles
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
