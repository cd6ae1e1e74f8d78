//! GeoTIFF and GDAL georeferencing tags

use log::warn;

use super::ifd::{TagValue, IFD};
use super::tags;
use crate::geogrid::GeoTransform;
use crate::sink::{RasterMetadata, EPSG_WGS84};

/// GeoKey constants
pub mod geo_keys {
    pub const GT_MODEL_TYPE: u16 = 1024;
    pub const GT_RASTER_TYPE: u16 = 1025;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const GEOG_CITATION: u16 = 2049;
    pub const GEOG_ANGULAR_UNITS: u16 = 2054;

    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
    pub const ANGULAR_DEGREE: u16 = 9102;
}

/// Whether an EPSG code names a geographic (lat/lon) CRS
pub fn is_geographic_epsg(epsg: u16) -> bool {
    (4000..5000).contains(&epsg)
}

/// Model tags describing a geotransform
///
/// North-up transforms use a pixel scale plus a single tiepoint at the
/// upper-left corner; anything rotated or south-up needs the full matrix.
pub fn model_tags(transform: &GeoTransform) -> Vec<(u16, TagValue)> {
    let [x0, sx, rx, y0, ry, sy] = transform.coefficients();
    if transform.is_north_up() {
        vec![
            (tags::MODEL_PIXEL_SCALE, TagValue::Double(vec![sx, -sy, 0.0])),
            (
                tags::MODEL_TIEPOINT,
                TagValue::Double(vec![0.0, 0.0, 0.0, x0, y0, 0.0]),
            ),
        ]
    } else {
        vec![(
            tags::MODEL_TRANSFORMATION,
            TagValue::Double(vec![
                sx, rx, 0.0, x0, //
                ry, sy, 0.0, y0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]),
        )]
    }
}

/// GeoKeyDirectory and GeoAsciiParams values for a geographic EPSG code
pub fn key_directory(epsg: u16) -> (TagValue, Option<TagValue>) {
    use geo_keys::*;

    // (key, location, count, value), ascending key order
    let mut keys: Vec<[u16; 4]> = Vec::new();
    let mut ascii = None;

    keys.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
    keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    keys.push([GEOGRAPHIC_TYPE, 0, 1, epsg]);
    if epsg == EPSG_WGS84 {
        let citation = "WGS 84|";
        keys.push([GEOG_CITATION, tags::GEO_ASCII_PARAMS, citation.len() as u16, 0]);
        ascii = Some(TagValue::Ascii(citation.to_string()));
    }
    keys.push([GEOG_ANGULAR_UNITS, 0, 1, ANGULAR_DEGREE]);

    // header: version 1, revision 1.0, key count
    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.iter().flatten());
    (TagValue::Short(directory), ascii)
}

/// GDAL_METADATA document carrying per-band scale and offset
pub fn gdal_metadata_xml(scales: &[Option<f64>]) -> Option<String> {
    if scales.iter().all(Option::is_none) {
        return None;
    }

    let mut xml = String::from("<GDALMetadata>\n");
    for (band, scale) in scales.iter().enumerate() {
        if let Some(scale) = scale {
            xml.push_str(&format!(
                "  <Item name=\"OFFSET\" sample=\"{}\" role=\"offset\">0</Item>\n",
                band
            ));
            xml.push_str(&format!(
                "  <Item name=\"SCALE\" sample=\"{}\" role=\"scale\">{}</Item>\n",
                band, scale
            ));
        }
    }
    xml.push_str("</GDALMetadata>");
    Some(xml)
}

/// Text form of a no-data value as GDAL stores it
pub fn gdal_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value)
    }
}

/// Adds every georeferencing tag the metadata calls for
pub fn apply_metadata(ifd: &mut IFD, metadata: &RasterMetadata) {
    if let Some(transform) = &metadata.geotransform {
        for (tag, value) in model_tags(transform) {
            ifd.set(tag, value);
        }
    }

    if let Some(epsg) = metadata.epsg {
        let (directory, ascii) = key_directory(epsg);
        ifd.set(tags::GEO_KEY_DIRECTORY, directory);
        if let Some(ascii) = ascii {
            ifd.set(tags::GEO_ASCII_PARAMS, ascii);
        }
    }

    if let Some(xml) = gdal_metadata_xml(&metadata.scales) {
        ifd.set(tags::GDAL_METADATA, TagValue::Ascii(xml));
    }

    // GDAL keeps one no-data value per dataset
    let mut nodata = metadata.nodata.iter().flatten();
    if let Some(&value) = nodata.next() {
        if nodata.any(|&other| other != value) {
            warn!("Bands declare different no-data values, writing {}", value);
        }
        ifd.set(tags::GDAL_NODATA, TagValue::Ascii(gdal_nodata(value)));
    }
}
