//! Diagnostic computations
//!
//! Each diagnostic turns preprocessed inputs into derived data:
//! - [`lifetime`]: ratio of weighted sums over a vertical region
//! - [`timeseries`]: moving averages and anomalies of 1-D series
//! - [`multimodel`]: multi-model mean of equally shaped fields and series
//! - [`boxplot`]: relative change per kelvin grouped by variable and ECS group

pub mod boxplot;
pub mod lifetime;
pub mod multimodel;
pub mod timeseries;

pub use boxplot::{
    box_statistics, collect_records, run_boxplot, BoxStats, BoxplotOutputs, BoxplotRecord, ScalarLoader,
};
pub use lifetime::{calculate_lifetime, sum_to_plot_dimensions, PlotType, Reduced};
pub use multimodel::{multi_model_mean, multi_model_timeseries, MultiModelMean};
pub use timeseries::{
    calculate_anomaly, moving_average, process_timeseries, write_timeseries_csv, MovingWindow, Timeseries, WindowUnit,
};
