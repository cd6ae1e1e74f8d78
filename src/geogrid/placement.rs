//! Placement of decoded tiles onto the output canvas
//!
//! The canvas is addressed top-left origin, rows growing downward. GEOGRID
//! datasets with positive `dy` store rows south to north, so their tiles are
//! flipped and anchored from the bottom of the canvas.

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geogrid::catalog::TileBounds;
use crate::geogrid::decoder::DecodedTile;
use crate::sink::RasterSink;
use crate::types::Dimensions;

/// Direction in which stored rows advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// First stored row is the northernmost (`dy < 0`)
    TopToBottom,
    /// First stored row is the southernmost (`dy >= 0`)
    BottomToTop,
}

impl RowOrder {
    /// Derives row order from the sign of the pixel height
    pub fn from_dy(dy: f64) -> Self {
        if dy < 0.0 {
            RowOrder::TopToBottom
        } else {
            RowOrder::BottomToTop
        }
    }
}

/// Where and how a tile lands on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Zero-based destination column of the tile's left edge
    pub x_off: usize,
    /// Zero-based destination row of the tile's top edge
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
    /// Whether tile rows must be reversed before writing
    pub reverse_rows: bool,
}

/// Computes tile placements for one canvas
#[derive(Debug, Clone, Copy)]
pub struct MosaicPlacer {
    row_order: RowOrder,
    canvas: Dimensions,
}

impl MosaicPlacer {
    pub fn new(row_order: RowOrder, canvas: Dimensions) -> Self {
        Self { row_order, canvas }
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Destination offset and orientation for a tile
    pub fn placement(&self, bounds: &TileBounds) -> Result<Placement> {
        let width = bounds.width();
        let height = bounds.height();
        if bounds.x_start == 0
            || bounds.y_start == 0
            || bounds.x_end > self.canvas.width
            || bounds.y_end > self.canvas.height
        {
            return Err(Error::InvalidTileBounds(format!(
                "{:?} outside canvas {}x{}",
                bounds, self.canvas.width, self.canvas.height
            )));
        }

        let placement = match self.row_order {
            RowOrder::TopToBottom => Placement {
                x_off: bounds.x_start - 1,
                y_off: bounds.y_start - 1,
                width,
                height,
                reverse_rows: false,
            },
            RowOrder::BottomToTop => Placement {
                x_off: bounds.x_start - 1,
                y_off: self.canvas.height - bounds.y_end,
                width,
                height,
                reverse_rows: true,
            },
        };
        Ok(placement)
    }

    /// Writes every band of a decoded tile into the sink
    ///
    /// The tile is consumed: flipping happens in place and the buffer is
    /// released once the last band is written.
    pub fn place<S: RasterSink + ?Sized>(
        &self,
        mut tile: DecodedTile,
        bounds: &TileBounds,
        sink: &mut S,
    ) -> Result<Placement> {
        let placement = self.placement(bounds)?;
        let (_, rows, cols) = tile.dims();
        if rows != placement.height || cols != placement.width {
            return Err(Error::InvalidTileBounds(format!(
                "decoded tile is {}x{} but {:?} covers {}x{}",
                cols, rows, bounds, placement.width, placement.height
            )));
        }

        if placement.reverse_rows {
            tile.flip_rows();
        }

        for (band, samples) in tile.bands().enumerate() {
            sink.write_block(
                band,
                placement.x_off,
                placement.y_off,
                placement.width,
                placement.height,
                samples,
            )?;
        }
        debug!(
            "Placed {:?} at ({}, {}){}",
            bounds,
            placement.x_off,
            placement.y_off,
            if placement.reverse_rows { " flipped" } else { "" }
        );

        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::DataType;

    #[test]
    fn test_row_order_from_dy() {
        assert_eq!(RowOrder::from_dy(-0.1), RowOrder::TopToBottom);
        assert_eq!(RowOrder::from_dy(0.1), RowOrder::BottomToTop);
        assert_eq!(RowOrder::from_dy(0.0), RowOrder::BottomToTop);
    }

    #[test]
    fn test_top_to_bottom_placement() {
        let placer = MosaicPlacer::new(RowOrder::from_dy(-0.1), Dimensions::new(6, 3));
        let placement = placer.placement(&TileBounds::new(1, 3, 1, 3)).unwrap();
        assert_eq!((placement.x_off, placement.y_off), (0, 0));
        assert!(!placement.reverse_rows);

        let placement = placer.placement(&TileBounds::new(4, 6, 1, 3)).unwrap();
        assert_eq!((placement.x_off, placement.y_off), (3, 0));
    }

    #[test]
    fn test_bottom_to_top_placement() {
        let placer = MosaicPlacer::new(RowOrder::from_dy(0.1), Dimensions::new(3, 9));
        let placement = placer.placement(&TileBounds::new(1, 3, 7, 9)).unwrap();
        assert_eq!((placement.x_off, placement.y_off), (0, 0));
        assert!(placement.reverse_rows);

        let placement = placer.placement(&TileBounds::new(1, 3, 1, 3)).unwrap();
        assert_eq!((placement.x_off, placement.y_off), (0, 6));
    }

    #[test]
    fn test_placement_outside_canvas_fails() {
        let placer = MosaicPlacer::new(RowOrder::TopToBottom, Dimensions::new(3, 3));
        assert!(matches!(
            placer.placement(&TileBounds::new(1, 4, 1, 3)),
            Err(Error::InvalidTileBounds(_))
        ));
    }

    #[test]
    fn test_place_writes_unflipped_rows() {
        let placer = MosaicPlacer::new(RowOrder::TopToBottom, Dimensions::new(4, 2));
        let mut sink = MemorySink::new(4, 2, 1, DataType::U8);
        let tile = DecodedTile::new(1, 2, 2, vec![1, 2, 3, 4]).unwrap();
        placer.place(tile, &TileBounds::new(3, 4, 1, 2), &mut sink).unwrap();
        assert_eq!(sink.band(0), &[0, 0, 1, 2, 0, 0, 3, 4]);
    }

    #[test]
    fn test_place_flips_bottom_to_top_rows() {
        let placer = MosaicPlacer::new(RowOrder::BottomToTop, Dimensions::new(2, 4));
        let mut sink = MemorySink::new(2, 4, 2, DataType::I16);
        // stored south first: row 0 is the southern edge
        let tile = DecodedTile::new(2, 2, 2, vec![1, 2, 3, 4, -1, -2, -3, -4]).unwrap();
        let placement = placer.place(tile, &TileBounds::new(1, 2, 1, 2), &mut sink).unwrap();
        assert_eq!(placement.y_off, 2);
        assert_eq!(sink.band(0), &[0, 0, 0, 0, 3, 4, 1, 2]);
        assert_eq!(sink.band(1), &[0, 0, 0, 0, -3, -4, -1, -2]);
    }

    #[test]
    fn test_place_rejects_shape_mismatch() {
        let placer = MosaicPlacer::new(RowOrder::TopToBottom, Dimensions::new(4, 4));
        let mut sink = MemorySink::new(4, 4, 1, DataType::U8);
        let tile = DecodedTile::new(1, 2, 2, vec![1, 2, 3, 4]).unwrap();
        assert!(matches!(
            placer.place(tile, &TileBounds::new(1, 3, 1, 3), &mut sink),
            Err(Error::InvalidTileBounds(_))
        ));
    }
}
