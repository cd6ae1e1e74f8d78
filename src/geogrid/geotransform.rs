//! Pixel to geographic coordinate mapping
//!
//! GEOGRID anchors its grid with a known point: 1-based pixel
//! (`known_x`, `known_y`) sits at (`known_lon`, `known_lat`). The output
//! transform is the GDAL-style six coefficient form, always upper-left
//! origin with rows growing downward.

use serde::Serialize;

use crate::geogrid::index::DatasetIndex;
use crate::geogrid::placement::RowOrder;
use crate::types::Dimensions;

/// 2-D affine map: `x' = a*x + b*y + c`, `y' = d*x + e*y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn identity() -> Self {
        Self::translation(0.0, 0.0)
    }

    pub fn translation(x: f64, y: f64) -> Self {
        Self { a: 1.0, b: 0.0, c: x, d: 0.0, e: 1.0, f: y }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self { a: sx, b: 0.0, c: 0.0, d: 0.0, e: sy, f: 0.0 }
    }

    /// Maps a point through this transform
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

impl std::ops::Mul for Affine {
    type Output = Affine;

    /// `self * rhs` applies `rhs` first, then `self`
    fn mul(self, rhs: Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.b * rhs.d,
            b: self.a * rhs.b + self.b * rhs.e,
            c: self.a * rhs.c + self.b * rhs.f + self.c,
            d: self.d * rhs.a + self.e * rhs.d,
            e: self.d * rhs.b + self.e * rhs.e,
            f: self.d * rhs.c + self.e * rhs.f + self.f,
        }
    }
}

/// GDAL-ordered geotransform coefficients
///
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Returns the raw coefficients
    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Geographic coordinate of the upper-left corner
    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    /// True when the transform has no rotation and rows grow southward
    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0 && self.0[5] < 0.0
    }

    /// Converts zero-based pixel coordinates to geographic coordinates
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let t = &self.0;
        (
            t[0] + t[1] * col + t[2] * row,
            t[3] + t[4] * col + t[5] * row,
        )
    }

    /// Converts geographic coordinates to zero-based pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let t = &self.0;
        let det = t[1] * t[5] - t[2] * t[4];
        if det.abs() < 1e-15 {
            return None;
        }

        let dx = x - t[0];
        let dy = y - t[3];
        Some(((t[5] * dx - t[2] * dy) / det, (-t[4] * dx + t[1] * dy) / det))
    }

    /// Returns (min_x, min_y, max_x, max_y) for a raster of the given size
    pub fn bounding_box(&self, dims: Dimensions) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(dims.width as f64, 0.0),
            self.pixel_to_geo(0.0, dims.height as f64),
            self.pixel_to_geo(dims.width as f64, dims.height as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

/// Reference pixel and its geographic position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownPoint {
    /// 1-based column
    pub x: f64,
    /// 1-based row
    pub y: f64,
    pub lon: f64,
    pub lat: f64,
}

impl KnownPoint {
    pub fn from_index(index: &DatasetIndex) -> Self {
        Self {
            x: index.known_x,
            y: index.known_y,
            lon: index.known_lon,
            lat: index.known_lat,
        }
    }
}

/// Builds the output geotransform for a dataset
///
/// The known-point affine is evaluated at 1-based pixel `(1, 1)` for
/// top-to-bottom data and `(1, y_size)` for bottom-to-top data; the latter
/// also negates `dy` so the stored transform is always upper-left origin.
pub fn build_geotransform(
    known: KnownPoint,
    dx: f64,
    dy: f64,
    canvas: Dimensions,
    row_order: RowOrder,
) -> GeoTransform {
    let affine = Affine::translation(known.lon, known.lat)
        * Affine::scale(dx, dy)
        * Affine::translation(-known.x, -known.y);

    match row_order {
        RowOrder::TopToBottom => {
            let (ulx, uly) = affine.apply(1.0, 1.0);
            GeoTransform([ulx, dx, 0.0, uly, 0.0, dy])
        }
        RowOrder::BottomToTop => {
            let (ulx, uly) = affine.apply(1.0, canvas.height as f64);
            GeoTransform([ulx, dx, 0.0, uly, 0.0, -dy])
        }
    }
}

/// Builds the output geotransform from a parsed index
pub fn geotransform_for_index(index: &DatasetIndex, canvas: Dimensions) -> GeoTransform {
    build_geotransform(
        KnownPoint::from_index(index),
        index.dx,
        index.dy,
        canvas,
        RowOrder::from_dy(index.dy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn known(x: f64, y: f64, lon: f64, lat: f64) -> KnownPoint {
        KnownPoint { x, y, lon, lat }
    }

    #[test]
    fn test_affine_composition_order() {
        let affine = Affine::translation(10.0, 20.0) * Affine::scale(2.0, 3.0) * Affine::translation(-1.0, -1.0);
        assert_eq!(affine.apply(1.0, 1.0), (10.0, 20.0));
        assert_eq!(affine.apply(2.0, 3.0), (12.0, 26.0));
        assert_eq!(Affine::identity().apply(4.0, 5.0), (4.0, 5.0));
    }

    #[test]
    fn test_bottom_to_top_transform() {
        let gt = build_geotransform(known(1.0, 1.0, 0.0, 0.0), 0.5, 0.5, Dimensions::new(4, 2), RowOrder::BottomToTop);
        assert_eq!(gt.coefficients(), [0.0, 0.5, 0.0, 0.5, 0.0, -0.5]);
        assert!(gt.is_north_up());
    }

    #[test]
    fn test_top_to_bottom_transform() {
        let gt = build_geotransform(known(1.0, 1.0, 10.0, 50.0), 0.25, -0.25, Dimensions::new(8, 8), RowOrder::TopToBottom);
        assert_eq!(gt.coefficients(), [10.0, 0.25, 0.0, 50.0, 0.0, -0.25]);
    }

    #[test]
    fn test_known_point_offset() {
        // anchor pixel (1, 10): two columns west and six rows north of (3, 4)
        let gt = build_geotransform(
            known(3.0, 4.0, -179.99583, -89.99583),
            0.00833333,
            0.00833333,
            Dimensions::new(100, 10),
            RowOrder::BottomToTop,
        );
        let (ulx, uly) = gt.origin();
        assert!(close(ulx, -179.99583 - 2.0 * 0.00833333));
        assert!(close(uly, -89.99583 + 6.0 * 0.00833333));
        assert!(close(gt.pixel_height(), -0.00833333));
    }

    #[test]
    fn test_geo_to_pixel_inverts_pixel_to_geo() {
        let gt = GeoTransform([100.0, 0.5, 0.0, 40.0, 0.0, -0.5]);
        let (x, y) = gt.pixel_to_geo(3.0, 7.0);
        let (col, row) = gt.geo_to_pixel(x, y).unwrap();
        assert!(close(col, 3.0) && close(row, 7.0));
    }

    #[test]
    fn test_bounding_box() {
        let gt = GeoTransform([0.0, 0.5, 0.0, 1.0, 0.0, -0.5]);
        assert_eq!(gt.bounding_box(Dimensions::new(4, 2)), (0.0, 0.0, 2.0, 1.0));
    }
}
