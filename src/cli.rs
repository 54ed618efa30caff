use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use lazy_static::lazy_static;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

lazy_static! {
    pub static ref BUILD_INFO: String = format!(
        "  ver: {}  rev: {}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH")
    );
}

#[derive(Parser, Debug)]
#[command(name = "wr", version = BUILD_INFO.as_str(), rename_all = "kebab-case")]
/// Summarize a warp S3 benchmark result matrix.
///
/// The test-matrix runner leaves one result artifact plus a .log per tested
/// (object size, concurrency) pair, named <op>_<size>_c<concurrency>.<ext>.
/// Point this tool at that directory to get a tabular dataset and a text
/// summary of the best configurations.
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a directory of warp result artifacts
    Analyze(AnalyzeCfg),
}

#[derive(Args, Debug)]
pub struct AnalyzeCfg {
    /// Directory holding the result artifacts and logs
    pub results_dir: PathBuf,
    #[arg(short = 'o', long = "output_dir")]
    /// Write performance_summary.txt and dataset.csv into this directory
    pub output_dir: Option<PathBuf>,
    #[arg(long = "tolerance", default_value_t = 5.0)]
    /// Relative throughput drop in percent that counts as degradation
    pub tolerance: f64,
    #[arg(short = 'c', long = "csv_output")]
    /// Print the dataset as csv rows instead of a table
    pub csv_output: bool,
    #[arg(short = 'v', action = ArgAction::Count)]
    /// Verbosity - use more than one v for greater detail
    pub verbose: u8,
    #[arg(long = "stats")]
    /// Print scan statistics to stderr at the end
    pub stats: bool,
}

pub fn get_cli() -> Result<AnalyzeCfg> {
    let cli = Cli::parse();
    let Command::Analyze(cfg) = cli.command;
    if !(0.0..100.0).contains(&cfg.tolerance) {
        Err(format!(
            "tolerance must be within [0,100) percent, got {}",
            cfg.tolerance
        ))?;
    }
    if cfg.verbose == 1 {
        eprintln!("CLI options: {:?}", cfg);
    } else if cfg.verbose > 1 {
        eprintln!("CLI options: {:#?}", cfg);
    }
    Ok(cfg)
}
