//! Multi-model mean of equally shaped fields and time series

use super::timeseries::Timeseries;
use crate::errors::{DiagError, Result};
use crate::metadata::DatasetMetadata;
use crate::statistics::{MaskedReduction, StatOperation};
use ndarray::{stack, Array1, ArrayD, ArrayViewD, Axis};

pub const MULTI_MODEL_MEAN: &str = "MultiModelMean";

/// Mean across datasets, labelled like a dataset of its own
#[derive(Debug, Clone)]
pub struct MultiModelMean {
    pub data: ArrayD<f64>,
    pub attributes: DatasetMetadata,
}

/// Mean of `members` (dataset name, data) ignoring non-finite values.
///
/// A point that is invalid in every member stays NaN.
///
/// # Errors
///
/// Fails if `members` is empty or the members differ in shape.
pub fn multi_model_mean(members: &[(String, ArrayD<f64>)], short_name: &str) -> Result<MultiModelMean> {
    let Some((_, first)) = members.first() else {
        return Err(DiagError::StatisticsError(
            "multi-model mean needs at least one dataset".to_string(),
        ));
    };
    if let Some((name, odd)) = members.iter().find(|(_, d)| d.shape() != first.shape()) {
        log::error!("Dataset '{name}' does not match the grid of the other members");
        return Err(DiagError::ShapeMismatch {
            expected: first.shape().to_vec(),
            actual: odd.shape().to_vec(),
        });
    }

    log::debug!("Calculating multi-model mean of {} datasets", members.len());
    let views: Vec<ArrayViewD<f64>> = members.iter().map(|(_, d)| d.view()).collect();
    let stacked = stack(Axis(0), &views)?;
    let data = stacked.reduce_along_axis(None, 0, StatOperation::Mean)?;

    let names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
    let attributes = DatasetMetadata::new()
        .with("dataset", MULTI_MODEL_MEAN)
        .with("short_name", short_name)
        .with("datasets", names.join("|"));

    Ok(MultiModelMean { data, attributes })
}

/// Multi-model mean of time series (dataset name, series) sharing one time axis.
///
/// # Errors
///
/// Fails if `members` is empty, or the members differ in length, time points
/// or units.
pub fn multi_model_timeseries(members: &[(String, Timeseries)]) -> Result<Timeseries> {
    let Some((_, first)) = members.first() else {
        return Err(DiagError::StatisticsError(
            "multi-model mean needs at least one dataset".to_string(),
        ));
    };
    for (name, series) in members {
        if series.len() == first.len() && series.time.points != first.time.points {
            return Err(DiagError::StatisticsError(format!(
                "time points of '{name}' differ from the other members"
            )));
        }
        if series.units != first.units {
            return Err(DiagError::StatisticsError(format!(
                "'{name}' is in {} instead of {}",
                series.units, first.units
            )));
        }
    }

    let values: Vec<(String, ArrayD<f64>)> = members
        .iter()
        .map(|(name, series)| (name.clone(), series.values.clone().into_dyn()))
        .collect();
    let mean = multi_model_mean(&values, &first.name)?;
    let values: Array1<f64> = mean.data.into_dimensionality()?;
    log::info!("{MULTI_MODEL_MEAN} of '{}' over {} datasets", first.name, members.len());
    Timeseries::new(first.name.clone(), first.units.clone(), first.time.clone(), values)
}
