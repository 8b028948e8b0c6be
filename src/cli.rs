//! Defines command-line interface options using `clap` for the climdiag application.

use crate::diagnostics::{MovingWindow, PlotType};
use crate::region::Region;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Climate-model diagnostics over NetCDF fields
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    name = "climdiag",
    about = "Path templating, tropopause-based region extraction and diagnostic reductions"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Threads for masking and reductions; 0 uses every CPU core. Defaults to Rayon's choice.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve path templates against dataset metadata and print the results
    Resolve {
        /// Path template, may be given several times
        #[arg(long = "template", required = true)]
        templates: Vec<String>,

        /// JSON file with the dataset metadata
        #[arg(long)]
        metadata: PathBuf,
    },

    /// Mask a 4-D variable outside the troposphere or stratosphere
    ExtractRegion {
        /// Path to the NetCDF file
        #[arg(short, long)]
        file: PathBuf,

        /// Variable to extract
        #[arg(long)]
        var: String,

        /// Region to keep: TROP or STRA
        #[arg(long, value_parser = parse_region)]
        region: Region,

        /// File with `tp_i` and/or `ptp`. Defaults to the input file.
        #[arg(long)]
        tropopause_file: Option<PathBuf>,

        /// Path of the NetCDF output
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Lifetime of a species over a region
    Lifetime {
        /// Path to the NetCDF file
        #[arg(short, long)]
        file: PathBuf,

        /// Reaction rate variable
        #[arg(long)]
        reaction: String,

        /// Weight variable, e.g. the species' mass
        #[arg(long)]
        weight: String,

        /// Region to sum over: TROP or STRA
        #[arg(long, value_parser = parse_region)]
        region: Region,

        /// timeseries, zonal_mean_profile or 1d_profile
        #[arg(long, value_parser = parse_plot_type, default_value = "timeseries")]
        plot_type: PlotType,

        /// File with `tp_i` and/or `ptp`. Defaults to the input file.
        #[arg(long)]
        tropopause_file: Option<PathBuf>,

        /// Path of the NetCDF output
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Moving average and anomaly of a time series
    Timeseries {
        /// NetCDF file per dataset; several files are reduced to their multi-model mean
        #[arg(short, long, num_args = 1.., required = true)]
        file: Vec<PathBuf>,

        /// 1-D variable over time
        #[arg(long)]
        var: String,

        /// Window such as "10 years"
        #[arg(long, value_parser = parse_window)]
        moving_average: Option<MovingWindow>,

        /// Reference period, formatted as <start_year> <end_year>
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        anomaly: Option<Vec<i32>>,

        /// Path of the CSV output
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Relative change per kelvin of warming, grouped for boxplots
    Boxplot {
        /// Diagnostic settings JSON
        #[arg(long)]
        settings: PathBuf,
    },
}

fn parse_region(s: &str) -> Result<Region, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_plot_type(s: &str) -> Result<PlotType, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_window(s: &str) -> Result<MovingWindow, String> {
    s.parse().map_err(|e| format!("{e}"))
}
