//! Human and machine readable dataset reports

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geogrid::DatasetIndex;
use crate::pipeline::MosaicPlan;

/// One line of the placement plan
#[derive(Debug, Serialize)]
struct PlanRow<'a> {
    tile: &'a str,
    x_start: usize,
    x_end: usize,
    y_start: usize,
    y_end: usize,
    x_off: usize,
    y_off: usize,
    width: usize,
    height: usize,
    reverse_rows: bool,
}

/// Writes the placement plan as CSV, one row per tile in catalog order
///
/// Returns the number of rows written.
pub fn write_plan<W: Write>(plan: &MosaicPlan, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let placements = plan.placements()?;

    for (record, placement) in &placements {
        let tile = record
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        csv.serialize(PlanRow {
            tile,
            x_start: record.bounds.x_start,
            x_end: record.bounds.x_end,
            y_start: record.bounds.y_start,
            y_end: record.bounds.y_end,
            x_off: placement.x_off,
            y_off: placement.y_off,
            width: placement.width,
            height: placement.height,
            reverse_rows: placement.reverse_rows,
        })?;
    }
    csv.flush().map_err(|e| Error::Report(e.to_string()))?;

    Ok(placements.len())
}

/// Writes the placement plan CSV to `path`
pub fn write_plan_file<P: AsRef<Path>>(plan: &MosaicPlan, path: P) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| Error::Report(format!("cannot create {}: {}", path.display(), e)))?;
    let rows = write_plan(plan, file)?;
    info!("Wrote placement plan for {} tiles to {}", rows, path.display());
    Ok(rows)
}

/// Renders the parsed index, passthrough keys included, as pretty JSON
pub fn index_json(index: &DatasetIndex) -> Result<String> {
    Ok(serde_json::to_string_pretty(index)?)
}
