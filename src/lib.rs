//! climdiag: climate-model diagnostics over NetCDF fields
//!
//! A Rust library and command-line tool for the building blocks of
//! climate-model evaluation diagnostics: resolving output path templates
//! against dataset metadata, masking fields to the troposphere or the
//! stratosphere, and reducing the masked fields to the quantities a
//! diagnostic plots.
//!
//! ## Key Features
//!
//! - **Path templating**: `{tag}` placeholders with case modifiers and list fan-out
//! - **Region extraction**: tropopause from `tp_i`, `ptp` or a climatology
//! - **Parallel Processing**: Efficient masking and reductions using Rayon
//! - **Diagnostics**: lifetimes, moving averages, anomalies, multi-model means
//!   and per-kelvin relative changes
//!
//! ## Module Organization
//!
//! - [`tags`]: path template resolution
//! - [`paths`]: plot and work file locations
//! - [`metadata`]: dataset metadata and grouping
//! - [`config`]: diagnostic settings
//! - [`field`]: labeled 4-D fields and vertical coordinates
//! - [`region`]: troposphere and stratosphere masking
//! - [`statistics`]: masked parallel reductions
//! - [`diagnostics`]: diagnostic computations
//! - [`time`]: CF time decoding
//! - [`netcdf_io`]: NetCDF reading and writing
//! - [`parallel`]: Parallel processing configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use climdiag::prelude::*;
//! use netcdf::open;
//!
//! let file = open("o3.nc").unwrap();
//! let field = load_field(&file, "o3").unwrap();
//! let tropopause = load_tropopause(&file).unwrap();
//! let troposphere = extract_region(&field, Region::Troposphere, &tropopause).unwrap();
//!
//! let output = std::path::Path::new("o3_trop.nc");
//! NetCDFWriter::new(&file, output).write_field(&troposphere).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod field;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod paths;
pub mod region;
pub mod statistics;
pub mod tags;
pub mod time;

pub use errors::{DiagError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::DiagnosticSettings;
    pub use crate::diagnostics::{calculate_lifetime, MovingWindow, PlotType, Timeseries};
    pub use crate::errors::{DiagError, Result};
    pub use crate::field::{Field, VerticalAxis};
    pub use crate::metadata::DatasetMetadata;
    pub use crate::netcdf_io::{load_field, load_timeseries, load_tropopause, NetCDFWriter};
    pub use crate::parallel::ParallelConfig;
    pub use crate::region::{extract_region, Region, TropopauseFields};
    pub use crate::statistics::{MaskedReduction, StatOperation};
    pub use crate::tags::replace_tags;
}
