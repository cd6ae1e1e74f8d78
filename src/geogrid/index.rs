//! GEOGRID `index` metadata parsing
//!
//! The index is a flat `key = value` text file. Values are coerced by a fixed
//! field table, defaults are seeded before parsing, and keys this crate has
//! no typed slot for are carried through untouched in [`DatasetIndex::extra`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::types::DataType;

/// Name of the metadata file inside a GEOGRID dataset directory
pub const INDEX_FILE_NAME: &str = "index";

const INT_FIELDS: &[&str] = &[
    "category_min",
    "category_max",
    "tile_x",
    "tile_y",
    "tile_z",
    "tile_z_start",
    "tile_z_end",
    "wordsize",
    "filename_digits",
    "tile_bdr",
];

const FLOAT_FIELDS: &[&str] = &[
    "dx",
    "dy",
    "known_x",
    "known_y",
    "known_lat",
    "known_lon",
    "scale_factor",
    "missing_value",
];

const BOOL_FIELDS: &[&str] = &["signed"];

/// Keys that map onto typed [`DatasetIndex`] fields
const TYPED_KEYS: &[&str] = &[
    "projection",
    "type",
    "endian",
    "units",
    "description",
    "category_min",
    "category_max",
    "tile_x",
    "tile_y",
    "tile_z",
    "tile_z_start",
    "tile_z_end",
    "wordsize",
    "filename_digits",
    "tile_bdr",
    "dx",
    "dy",
    "known_x",
    "known_y",
    "known_lat",
    "known_lon",
    "scale_factor",
    "missing_value",
    "signed",
];

/// A coerced index value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl IndexValue {
    fn as_int(&self, key: &str) -> Result<i64> {
        match self {
            IndexValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(key, "integer", other)),
        }
    }

    fn as_float(&self, key: &str) -> Result<f64> {
        match self {
            IndexValue::Float(v) => Ok(*v),
            IndexValue::Int(v) => Ok(*v as f64),
            other => Err(type_mismatch(key, "float", other)),
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            IndexValue::Bool(v) => Ok(*v),
            other => Err(type_mismatch(key, "boolean", other)),
        }
    }

    fn as_text(&self) -> String {
        match self {
            IndexValue::Int(v) => v.to_string(),
            IndexValue::Float(v) => v.to_string(),
            IndexValue::Bool(v) => (if *v { "yes" } else { "no" }).to_string(),
            IndexValue::Text(v) => v.clone(),
        }
    }
}

fn type_mismatch(key: &str, expected: &str, found: &IndexValue) -> Error {
    Error::MalformedIndex(format!("'{}' must be {}, found {:?}", key, expected, found))
}

/// Map projection declared by the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Projection {
    /// Regular latitude/longitude grid
    RegularLatLon,
    /// Any other WPS projection name, kept for diagnostics
    Other(String),
}

impl Projection {
    fn from_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("regular_ll") {
            Projection::RegularLatLon
        } else {
            Projection::Other(value.to_string())
        }
    }

    /// Returns the WPS name of this projection
    pub fn name(&self) -> &str {
        match self {
            Projection::RegularLatLon => "regular_ll",
            Projection::Other(name) => name,
        }
    }
}

impl From<Projection> for String {
    fn from(projection: Projection) -> Self {
        projection.name().to_string()
    }
}

/// Whether samples are measurements or class codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Continuous,
    Categorical,
}

/// Typed description of a GEOGRID dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetIndex {
    pub projection: Projection,
    #[serde(rename = "type")]
    pub kind: DatasetKind,
    /// Pixel width in degrees
    pub dx: f64,
    /// Pixel height in degrees; negative for top-to-bottom row order
    pub dy: f64,
    /// 1-based column of the reference point
    pub known_x: f64,
    /// 1-based row of the reference point
    pub known_y: f64,
    pub known_lat: f64,
    pub known_lon: f64,
    /// Interior tile width, border excluded
    pub tile_x: usize,
    /// Interior tile height, border excluded
    pub tile_y: usize,
    /// Number of bands
    pub tile_z: usize,
    pub tile_z_start: Option<i64>,
    pub tile_z_end: Option<i64>,
    /// Bytes per encoded sample (1-4)
    pub wordsize: usize,
    pub signed: bool,
    /// Border cells on each side of every tile
    pub tile_bdr: usize,
    /// Width of each coordinate field in tile filenames
    pub filename_digits: usize,
    pub scale_factor: f64,
    pub missing_value: Option<f64>,
    pub category_min: Option<i64>,
    pub category_max: Option<i64>,
    pub endian: ByteOrder,
    pub units: Option<String>,
    pub description: Option<String>,
    /// Keys without a typed field, lower-cased
    pub extra: BTreeMap<String, IndexValue>,
}

/// Reads and parses the `index` file at `path`
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<DatasetIndex> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        Error::MalformedIndex(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_index(&text)
}

/// Parses index text into a [`DatasetIndex`]
pub fn parse_index(text: &str) -> Result<DatasetIndex> {
    let entries = parse_entries(text)?;
    DatasetIndex::from_entries(entries)
}

/// Parses index text into coerced key/value entries, defaults included
pub fn parse_entries(text: &str) -> Result<BTreeMap<String, IndexValue>> {
    let mut entries = default_entries();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::MalformedIndex(format!("line {}: expected 'key = value'", number + 1))
        })?;
        let key = key.trim().to_lowercase();
        let value = value.trim();

        let coerced = coerce(&key, value).map_err(|reason| {
            Error::MalformedIndex(format!("line {}: {}", number + 1, reason))
        })?;
        entries.insert(key, coerced);
    }

    Ok(entries)
}

fn default_entries() -> BTreeMap<String, IndexValue> {
    let mut entries = BTreeMap::new();
    entries.insert("filename_digits".to_string(), IndexValue::Int(5));
    entries.insert("signed".to_string(), IndexValue::Bool(false));
    entries.insert("known_x".to_string(), IndexValue::Float(1.0));
    entries.insert("known_y".to_string(), IndexValue::Float(1.0));
    entries.insert("scale_factor".to_string(), IndexValue::Float(1.0));
    entries.insert("endian".to_string(), IndexValue::Text("big".to_string()));
    entries.insert("tile_bdr".to_string(), IndexValue::Int(0));
    entries
}

fn coerce(key: &str, value: &str) -> std::result::Result<IndexValue, String> {
    if INT_FIELDS.contains(&key) {
        value
            .parse::<i64>()
            .map(IndexValue::Int)
            .map_err(|_| format!("'{}' is not an integer: {:?}", key, value))
    } else if FLOAT_FIELDS.contains(&key) {
        value
            .parse::<f64>()
            .map(IndexValue::Float)
            .map_err(|_| format!("'{}' is not a number: {:?}", key, value))
    } else if BOOL_FIELDS.contains(&key) {
        Ok(IndexValue::Bool(value == "yes"))
    } else {
        Ok(IndexValue::Text(strip_quotes(value).to_string()))
    }
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl DatasetIndex {
    /// Builds the typed index from coerced entries
    pub fn from_entries(entries: BTreeMap<String, IndexValue>) -> Result<Self> {
        let required = |key: &str| {
            entries
                .get(key)
                .ok_or_else(|| Error::MalformedIndex(format!("missing required key '{}'", key)))
        };
        let optional = |key: &str| entries.get(key);
        let dimension = |key: &str, value: i64| -> Result<usize> {
            usize::try_from(value).map_err(|_| {
                Error::MalformedIndex(format!("'{}' must be non-negative, found {}", key, value))
            })
        };

        let tile_z_start = optional("tile_z_start").map(|v| v.as_int("tile_z_start")).transpose()?;
        let tile_z_end = optional("tile_z_end").map(|v| v.as_int("tile_z_end")).transpose()?;
        let tile_z = match (tile_z_start, tile_z_end) {
            (Some(start), Some(end)) => {
                let count = end
                    .checked_sub(start)
                    .and_then(|span| span.checked_add(1))
                    .ok_or_else(|| {
                        Error::MalformedIndex(format!(
                            "tile_z range {}..={} overflows",
                            start, end
                        ))
                    })?;
                if count < 1 {
                    return Err(Error::MalformedIndex(format!(
                        "tile_z_end ({}) precedes tile_z_start ({})",
                        end, start
                    )));
                }
                dimension("tile_z", count)?
            }
            (None, None) => match optional("tile_z") {
                Some(value) => dimension("tile_z", value.as_int("tile_z")?)?,
                None => 1,
            },
            _ => {
                return Err(Error::MalformedIndex(
                    "both tile_z_start and tile_z_end are required".to_string(),
                ))
            }
        };

        let kind = match optional("type").map(IndexValue::as_text) {
            None => DatasetKind::Continuous,
            Some(kind) if kind.eq_ignore_ascii_case("continuous") => DatasetKind::Continuous,
            Some(kind) if kind.eq_ignore_ascii_case("categorical") => DatasetKind::Categorical,
            Some(kind) => {
                return Err(Error::UnsupportedDataset(format!("dataset type '{}'", kind)))
            }
        };

        let endian_text = required("endian")?.as_text();
        let endian = ByteOrder::from_index_value(&endian_text).ok_or_else(|| {
            Error::UnsupportedDataset(format!("endian '{}'", endian_text))
        })?;

        let extra: BTreeMap<String, IndexValue> = entries
            .iter()
            .filter(|(key, _)| !TYPED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for key in extra.keys() {
            debug!("Passing through index key '{}'", key);
        }

        Ok(Self {
            projection: Projection::from_value(&required("projection")?.as_text()),
            kind,
            dx: required("dx")?.as_float("dx")?,
            dy: required("dy")?.as_float("dy")?,
            known_x: required("known_x")?.as_float("known_x")?,
            known_y: required("known_y")?.as_float("known_y")?,
            known_lat: required("known_lat")?.as_float("known_lat")?,
            known_lon: required("known_lon")?.as_float("known_lon")?,
            tile_x: dimension("tile_x", required("tile_x")?.as_int("tile_x")?)?,
            tile_y: dimension("tile_y", required("tile_y")?.as_int("tile_y")?)?,
            tile_z,
            tile_z_start,
            tile_z_end,
            wordsize: dimension("wordsize", required("wordsize")?.as_int("wordsize")?)?,
            signed: required("signed")?.as_bool("signed")?,
            tile_bdr: dimension("tile_bdr", required("tile_bdr")?.as_int("tile_bdr")?)?,
            filename_digits: dimension(
                "filename_digits",
                required("filename_digits")?.as_int("filename_digits")?,
            )?,
            scale_factor: required("scale_factor")?.as_float("scale_factor")?,
            missing_value: optional("missing_value")
                .map(|v| v.as_float("missing_value"))
                .transpose()?,
            category_min: optional("category_min")
                .map(|v| v.as_int("category_min"))
                .transpose()?,
            category_max: optional("category_max")
                .map(|v| v.as_int("category_max"))
                .transpose()?,
            endian,
            units: optional("units").map(IndexValue::as_text),
            description: optional("description").map(IndexValue::as_text),
            extra,
        })
    }

    /// Checks that the dataset can be mosaicked onto a geographic grid
    pub fn validate(&self) -> Result<()> {
        if self.projection != Projection::RegularLatLon {
            return Err(Error::UnsupportedDataset(format!(
                "projection '{}' (only regular_ll is supported)",
                self.projection.name()
            )));
        }
        if !(self.dx > 0.0) {
            return Err(Error::UnsupportedDataset(format!("dx must be positive, found {}", self.dx)));
        }
        if self.dy == 0.0 || !self.dy.is_finite() {
            return Err(Error::UnsupportedDataset(format!("dy must be non-zero, found {}", self.dy)));
        }
        if !(1..=4).contains(&self.wordsize) {
            return Err(Error::UnsupportedDataset(format!(
                "wordsize {} (expected 1-4)",
                self.wordsize
            )));
        }
        if self.tile_x == 0 || self.tile_y == 0 || self.tile_z == 0 {
            return Err(Error::UnsupportedDataset(format!(
                "empty tile shape {}x{}x{}",
                self.tile_x, self.tile_y, self.tile_z
            )));
        }
        if self.tile_byte_len().is_none() {
            return Err(Error::UnsupportedDataset(format!(
                "tile shape {}x{}x{} with border {} and wordsize {} overflows",
                self.tile_x, self.tile_y, self.tile_z, self.tile_bdr, self.wordsize
            )));
        }
        if self.filename_digits == 0 {
            return Err(Error::UnsupportedDataset("filename_digits must be positive".to_string()));
        }
        if self.kind == DatasetKind::Categorical {
            if self.wordsize != 1 {
                return Err(Error::UnsupportedDataset(format!(
                    "categorical dataset with wordsize {} (expected 1)",
                    self.wordsize
                )));
            }
            if self.tile_z != 1 {
                return Err(Error::UnsupportedDataset(format!(
                    "categorical dataset with {} bands (expected 1)",
                    self.tile_z
                )));
            }
        }
        Ok(())
    }

    /// Returns true when stored rows run north to south
    pub fn is_top_to_bottom(&self) -> bool {
        self.dy < 0.0
    }

    /// Output sample type for this dataset's words
    pub fn sample_type(&self) -> Result<DataType> {
        DataType::for_word(self.wordsize, self.signed)
    }

    /// Tile width including both borders, `None` on overflow
    pub fn padded_x(&self) -> Option<usize> {
        self.tile_bdr.checked_mul(2)?.checked_add(self.tile_x)
    }

    /// Tile height including both borders, `None` on overflow
    pub fn padded_y(&self) -> Option<usize> {
        self.tile_bdr.checked_mul(2)?.checked_add(self.tile_y)
    }

    /// Exact byte length of one tile file, `None` when it does not fit a `usize`
    pub fn tile_byte_len(&self) -> Option<usize> {
        self.tile_z
            .checked_mul(self.padded_y()?)?
            .checked_mul(self.padded_x()?)?
            .checked_mul(self.wordsize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPO: &str = "\
# GMTED2010 30-arc-second topography
type = continuous
signed = yes
projection = regular_ll
dx = 0.00833333
dy = 0.00833333
known_x = 1.0
known_y = 1.0
known_lat = -89.99583
known_lon = -179.99583
wordsize = 2
tile_x = 1200
tile_y = 1200
tile_z = 1
units = \"meters MSL\"
description = \"Topography height\"
";

    #[test]
    fn test_parse_typical_index() {
        let index = parse_index(TOPO).unwrap();
        assert_eq!(index.projection, Projection::RegularLatLon);
        assert_eq!(index.kind, DatasetKind::Continuous);
        assert!(index.signed);
        assert_eq!(index.wordsize, 2);
        assert_eq!((index.tile_x, index.tile_y, index.tile_z), (1200, 1200, 1));
        assert_eq!(index.known_lat, -89.99583);
        assert_eq!(index.units.as_deref(), Some("meters MSL"));
        assert_eq!(index.description.as_deref(), Some("Topography height"));
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_defaults_seeded() {
        let index = parse_index(
            "projection=regular_ll\ndx=1\ndy=1\nknown_lat=0\nknown_lon=0\ntile_x=2\ntile_y=2\nwordsize=1\n",
        )
        .unwrap();
        assert_eq!(index.filename_digits, 5);
        assert!(!index.signed);
        assert_eq!((index.known_x, index.known_y), (1.0, 1.0));
        assert_eq!(index.scale_factor, 1.0);
        assert_eq!(index.endian, ByteOrder::BigEndian);
        assert_eq!(index.tile_bdr, 0);
        assert_eq!(index.tile_z, 1);
        assert_eq!(index.missing_value, None);
    }

    #[test]
    fn test_keys_case_insensitive_and_trimmed() {
        let entries = parse_entries("  TILE_X  =  40 \n Signed = yes\n").unwrap();
        assert_eq!(entries.get("tile_x"), Some(&IndexValue::Int(40)));
        assert_eq!(entries.get("signed"), Some(&IndexValue::Bool(true)));
    }

    #[test]
    fn test_boolean_only_yes_is_true() {
        let entries = parse_entries("signed = YES\n").unwrap();
        assert_eq!(entries.get("signed"), Some(&IndexValue::Bool(false)));
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let text = format!("{}mminlu = \"MODIFIED_IGBP_MODIS_NOAH\"\niswater = 17\n", TOPO);
        let index = parse_index(&text).unwrap();
        assert_eq!(
            index.extra.get("mminlu"),
            Some(&IndexValue::Text("MODIFIED_IGBP_MODIS_NOAH".to_string()))
        );
        assert_eq!(index.extra.get("iswater"), Some(&IndexValue::Text("17".to_string())));
        assert!(!index.extra.contains_key("dx"));
    }

    #[test]
    fn test_tile_z_from_start_and_end() {
        let text = TOPO.replace("tile_z = 1", "tile_z_start = 1\ntile_z_end = 12");
        let index = parse_index(&text).unwrap();
        assert_eq!(index.tile_z, 12);
    }

    #[test]
    fn test_tile_z_start_without_end_fails() {
        let text = TOPO.replace("tile_z = 1", "tile_z_start = 1");
        assert!(matches!(parse_index(&text), Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn test_tile_z_end_without_start_fails() {
        let text = TOPO.replace("tile_z = 1", "tile_z_end = 3");
        assert!(matches!(parse_index(&text), Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn test_bad_integer_fails() {
        let text = TOPO.replace("wordsize = 2", "wordsize = two");
        let err = parse_index(&text).unwrap_err();
        assert!(matches!(err, Error::MalformedIndex(ref msg) if msg.contains("wordsize")));
    }

    #[test]
    fn test_line_without_equals_fails() {
        assert!(matches!(parse_entries("projection regular_ll\n"), Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn test_missing_required_key_fails() {
        let text = TOPO.replace("dx = 0.00833333\n", "");
        let err = parse_index(&text).unwrap_err();
        assert!(matches!(err, Error::MalformedIndex(ref msg) if msg.contains("'dx'")));
    }

    #[test]
    fn test_unreadable_index_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_index(dir.path().join(INDEX_FILE_NAME));
        assert!(matches!(result, Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn test_validate_rejects_other_projection() {
        let text = TOPO.replace("regular_ll", "lambert");
        let index = parse_index(&text).unwrap();
        assert_eq!(index.projection, Projection::Other("lambert".to_string()));
        assert!(matches!(index.validate(), Err(Error::UnsupportedDataset(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_dx() {
        let text = TOPO.replace("dx = 0.00833333", "dx = -0.00833333");
        let index = parse_index(&text).unwrap();
        assert!(matches!(index.validate(), Err(Error::UnsupportedDataset(_))));
    }

    #[test]
    fn test_validate_rejects_wide_categorical() {
        let text = TOPO.replace("type = continuous", "type = categorical");
        let index = parse_index(&text).unwrap();
        assert_eq!(index.kind, DatasetKind::Categorical);
        assert!(matches!(index.validate(), Err(Error::UnsupportedDataset(_))));
    }

    #[test]
    fn test_little_endian_accepted() {
        let text = format!("{}endian = little\n", TOPO);
        let index = parse_index(&text).unwrap();
        assert_eq!(index.endian, ByteOrder::LittleEndian);
    }

    #[test]
    fn test_unknown_endian_rejected() {
        let text = format!("{}endian = middle\n", TOPO);
        assert!(matches!(parse_index(&text), Err(Error::UnsupportedDataset(_))));
    }

    #[test]
    fn test_tile_byte_len_includes_border() {
        let text = format!("{}tile_bdr = 3\n", TOPO);
        let index = parse_index(&text).unwrap();
        assert_eq!(index.padded_x(), Some(1206));
        assert_eq!(index.tile_byte_len(), Some(1206 * 1206 * 2));
    }

    #[test]
    fn test_validate_rejects_overflowing_tile_shape() {
        let text = TOPO.replace("tile_z = 1", "tile_z = 4611686018427387904");
        let index = parse_index(&text).unwrap();
        assert_eq!(index.tile_byte_len(), None);
        let err = index.validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDataset(ref msg) if msg.contains("overflows")));

        let text = format!("{}tile_bdr = 9223372036854775807\n", TOPO);
        let index = parse_index(&text).unwrap();
        assert_eq!(index.padded_x(), None);
        assert!(matches!(index.validate(), Err(Error::UnsupportedDataset(_))));
    }

    #[test]
    fn test_overflowing_tile_z_range_fails() {
        let text = TOPO.replace(
            "tile_z = 1",
            "tile_z_start = -9223372036854775808\ntile_z_end = 9223372036854775807",
        );
        let err = parse_index(&text).unwrap_err();
        assert!(matches!(err, Error::MalformedIndex(ref msg) if msg.contains("overflows")));
    }

    #[test]
    fn test_inverted_tile_z_range_fails() {
        let text = TOPO.replace("tile_z = 1", "tile_z_start = 5\ntile_z_end = 2");
        let err = parse_index(&text).unwrap_err();
        assert!(matches!(err, Error::MalformedIndex(ref msg) if msg.contains("precedes")));
    }

    #[test]
    fn test_validate_rejects_multiband_categorical() {
        let text = TOPO
            .replace("type = continuous", "type = categorical")
            .replace("wordsize = 2", "wordsize = 1")
            .replace("tile_z = 1", "tile_z = 3");
        let index = parse_index(&text).unwrap();
        let err = index.validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDataset(ref msg) if msg.contains("3 bands")));
    }

    #[test]
    fn test_validate_rejects_zero_dy() {
        let text = TOPO.replace("dy = 0.00833333", "dy = 0");
        let index = parse_index(&text).unwrap();
        let err = index.validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDataset(ref msg) if msg.contains("dy")));
    }

    #[test]
    fn test_row_order_from_dy() {
        let index = parse_index(TOPO).unwrap();
        assert!(!index.is_top_to_bottom());
        let flipped = parse_index(&TOPO.replace("dy = 0.00833333", "dy = -0.00833333")).unwrap();
        assert!(flipped.is_top_to_bottom());
    }
}
