//! Error types for geogrid-mosaic

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for geogrid-mosaic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building a mosaic
#[derive(Debug)]
pub enum Error {
    /// I/O error while reading the index or a tile
    Io(io::Error),

    /// The index file could not be parsed into a dataset description
    MalformedIndex(String),

    /// Projection, type, word size or band layout outside the supported set
    UnsupportedDataset(String),

    /// No tile files matched the expected filename pattern
    EmptyDataset(PathBuf),

    /// A tile's filename range disagrees with the declared tile shape
    InvalidTileBounds(String),

    /// Tile payload length does not match the declared shape
    TruncatedTile { expected: usize, actual: usize },

    /// Error raised while processing a specific tile
    Tile { path: PathBuf, source: Box<Error> },

    /// I/O error raised by the output raster
    SinkIo(io::Error),

    /// The output raster rejected an operation
    Sink(String),

    /// Plan or index report could not be written
    Report(String),

    /// Run options rejected before any work started
    InvalidOptions(String),
}

impl Error {
    /// Attaches the tile path to an error raised while handling that tile
    pub fn in_tile(self, path: impl Into<PathBuf>) -> Self {
        Error::Tile {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::MalformedIndex(msg) => write!(f, "Malformed index: {}", msg),
            Error::UnsupportedDataset(msg) => write!(f, "Unsupported dataset: {}", msg),
            Error::EmptyDataset(dir) => {
                write!(f, "No tile files found in {}", dir.display())
            }
            Error::InvalidTileBounds(msg) => write!(f, "Invalid tile bounds: {}", msg),
            Error::TruncatedTile { expected, actual } => write!(
                f,
                "Truncated tile: expected {} bytes, found {}",
                expected, actual
            ),
            Error::Tile { path, source } => write!(f, "{}: {}", path.display(), source),
            Error::SinkIo(e) => write!(f, "Output raster I/O error: {}", e),
            Error::Sink(msg) => write!(f, "Output raster error: {}", msg),
            Error::Report(msg) => write!(f, "Report error: {}", msg),
            Error::InvalidOptions(msg) => write!(f, "Invalid options: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::SinkIo(e) => Some(e),
            Error::Tile { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Report(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Report(error.to_string())
    }
}
