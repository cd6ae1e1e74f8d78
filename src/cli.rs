//! Command-line surface

use std::path::PathBuf;

use clap::Parser;

use crate::compression::Compression;
use crate::error::Result;
use crate::formats::tiff::GeoTiffOptions;
use crate::pipeline::{self, MosaicOptions, MosaicPlan, MosaicStats};
use crate::report;

/// Assemble a WPS GEOGRID tile directory into one GeoTIFF
#[derive(Parser, Debug)]
#[command(name = "geogrid-mosaic", version, about)]
pub struct Args {
    /// Dataset directory holding `index` and the tile files
    pub geog_dir: PathBuf,

    /// GeoTIFF to write
    pub output: PathBuf,

    /// Block compression: none, lzw or deflate
    #[arg(long, default_value = "deflate")]
    pub compression: Compression,

    /// Internal block edge in pixels, a multiple of 16
    #[arg(long, default_value_t = 256)]
    pub block_size: usize,

    /// Always write BigTIFF
    #[arg(long)]
    pub bigtiff: bool,

    /// Decoding threads (defaults to one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Also write the tile placement plan as CSV
    #[arg(long, value_name = "FILE.csv")]
    pub plan: Option<PathBuf>,

    /// Print the parsed index as JSON
    #[arg(long)]
    pub print_index: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn geotiff_options(&self) -> GeoTiffOptions {
        GeoTiffOptions {
            compression: self.compression,
            block_size: self.block_size,
            force_bigtiff: self.bigtiff,
            ..GeoTiffOptions::default()
        }
    }

    pub fn mosaic_options(&self) -> MosaicOptions {
        MosaicOptions { threads: self.threads }
    }
}

/// Runs one conversion as described by `args`
pub fn run(args: &Args) -> Result<MosaicStats> {
    let geotiff = args.geotiff_options();
    let options = args.mosaic_options();
    geotiff.validate()?;
    options.validate()?;

    let plan = MosaicPlan::from_dir(&args.geog_dir)?;
    if args.print_index {
        println!("{}", report::index_json(plan.index())?);
    }
    if let Some(path) = &args.plan {
        report::write_plan_file(&plan, path)?;
    }

    pipeline::convert_plan(&plan, &args.output, &geotiff, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::ffi::OsString;
    use std::fs;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["geogrid-mosaic", "topo_30s", "topo.tif"]).unwrap();
        assert_eq!(args.geog_dir, PathBuf::from("topo_30s"));
        assert_eq!(args.geotiff_options(), GeoTiffOptions::default());
        assert_eq!(args.mosaic_options(), MosaicOptions::default());
        assert!(!args.print_index);
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "geogrid-mosaic",
            "landuse",
            "landuse.tif",
            "--compression",
            "none",
            "--block-size",
            "512",
            "--bigtiff",
            "--threads",
            "3",
            "--plan",
            "plan.csv",
            "--print-index",
            "-v",
        ])
        .unwrap();
        let options = args.geotiff_options();
        assert_eq!(options.compression, Compression::None);
        assert_eq!(options.block_size, 512);
        assert!(options.force_bigtiff);
        assert_eq!(args.mosaic_options().threads, Some(3));
        assert_eq!(args.plan, Some(PathBuf::from("plan.csv")));
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_unknown_compression() {
        assert!(Args::try_parse_from(["geogrid-mosaic", "a", "b", "--compression", "jpeg"]).is_err());
        assert!(Args::try_parse_from(["geogrid-mosaic", "a"]).is_err());
    }

    #[test]
    fn test_run_writes_output_and_plan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index"),
            "projection=regular_ll\ndx=1\ndy=1\nknown_lat=0\nknown_lon=0\nwordsize=1\ntile_x=1\ntile_y=1\n",
        )
        .unwrap();
        fs::write(dir.path().join("00001-00001.00001-00001"), [9u8]).unwrap();
        let output = dir.path().join("out.tif");
        let plan = dir.path().join("plan.csv");

        let argv: Vec<OsString> = vec![
            "geogrid-mosaic".into(),
            dir.path().as_os_str().to_os_string(),
            output.as_os_str().to_os_string(),
            "--plan".into(),
            plan.as_os_str().to_os_string(),
        ];
        let args = Args::try_parse_from(argv).unwrap();
        let stats = run(&args).unwrap();

        assert_eq!(stats.tiles, 1);
        assert!(output.exists());
        assert_eq!(fs::read_to_string(&plan).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_run_rejects_bad_block_size_early() {
        let args = Args::try_parse_from(["geogrid-mosaic", "/nonexistent", "out.tif", "--block-size", "10"])
            .unwrap();
        assert!(matches!(run(&args), Err(Error::Sink(_))));
    }
}
