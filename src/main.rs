use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

use geogrid_mosaic::cli::{self, Args};

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    if let Err(e) = cli::run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
