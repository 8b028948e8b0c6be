//! Lifetime diagnostic
//!
//! The lifetime of a species over a region is `Σ weight / Σ (weight * reaction)`,
//! where the sums run over the dimensions that do not appear in the plot.

use crate::errors::{DiagError, Result};
use crate::field::Field;
use crate::region::{extract_region, Region, TropopauseFields};
use crate::statistics::{MaskedReduction, StatOperation};
use ndarray::{ArrayD, Zip};
use std::fmt;
use std::str::FromStr;

const TIME_AXIS: usize = 0;
const VERTICAL_AXIS: usize = 1;
const LATITUDE_AXIS: usize = 2;
const LONGITUDE_AXIS: usize = 3;

/// Kind of plot the reduced data is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    /// Sum over longitude, latitude and vertical
    Timeseries,
    /// Sum over longitude
    ZonalMeanProfile,
    /// Sum over longitude and latitude
    OneDProfile,
    /// Not available yet
    AnnualCycle,
}

impl FromStr for PlotType {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "timeseries" => Ok(Self::Timeseries),
            "zonal_mean_profile" => Ok(Self::ZonalMeanProfile),
            "1d_profile" => Ok(Self::OneDProfile),
            "annual_cycle" => Ok(Self::AnnualCycle),
            other => Err(DiagError::NotImplemented(format!("plot_type '{other}' is not supported"))),
        }
    }
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeseries => "timeseries",
            Self::ZonalMeanProfile => "zonal_mean_profile",
            Self::OneDProfile => "1d_profile",
            Self::AnnualCycle => "annual_cycle",
        };
        f.write_str(name)
    }
}

impl PlotType {
    /// Field axes summed away for this plot type
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::NotImplemented`] for [`PlotType::AnnualCycle`].
    pub fn summed_axes(self) -> Result<&'static [usize]> {
        match self {
            Self::Timeseries => Ok(&[VERTICAL_AXIS, LATITUDE_AXIS, LONGITUDE_AXIS]),
            Self::ZonalMeanProfile => Ok(&[LONGITUDE_AXIS]),
            Self::OneDProfile => Ok(&[LATITUDE_AXIS, LONGITUDE_AXIS]),
            Self::AnnualCycle => Err(DiagError::NotImplemented(format!(
                "The sum to plot dimensions for plot_type {self} is currently not implemented"
            ))),
        }
    }
}

/// Reduced data with the names of its remaining dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    pub data: ArrayD<f64>,
    pub dimensions: Vec<String>,
}

/// Sums `field` over the dimensions not shown by `plot_type`; masked points
/// are skipped.
///
/// # Errors
///
/// Returns [`DiagError::NotImplemented`] for plot types without a reduction.
pub fn sum_to_plot_dimensions(field: &Field, plot_type: PlotType) -> Result<Reduced> {
    let values = field.masked_values();
    sum_values(&values.into_dyn(), field, plot_type)
}

fn sum_values(values: &ArrayD<f64>, field: &Field, plot_type: PlotType) -> Result<Reduced> {
    let axes = plot_type.summed_axes()?;
    let data = values.reduce_along_axes(None, axes, StatOperation::Sum)?;
    let dimensions = [TIME_AXIS, VERTICAL_AXIS, LATITUDE_AXIS, LONGITUDE_AXIS]
        .into_iter()
        .filter(|a| !axes.contains(a))
        .map(|a| field.dimension_names[a].clone())
        .collect();
    Ok(Reduced { data, dimensions })
}

/// Lifetime of a species over `region` for `plot_type`.
///
/// Both inputs are masked outside the region first. Cells where the
/// denominator sums to zero are NaN.
///
/// # Errors
///
/// Fails if the fields differ in shape, if region extraction fails or if the
/// plot type has no reduction.
pub fn calculate_lifetime(
    reaction: &Field,
    weight: &Field,
    plot_type: PlotType,
    region: Region,
    tropopause: &TropopauseFields,
) -> Result<Reduced> {
    if reaction.dim() != weight.dim() {
        return Err(DiagError::ShapeMismatch {
            expected: weight.data.shape().to_vec(),
            actual: reaction.data.shape().to_vec(),
        });
    }

    let reaction = extract_region(reaction, region, tropopause)?;
    let weight = extract_region(weight, region, tropopause)?;

    let weight_values = weight.masked_values();
    let weighted_reaction = Zip::from(&weight_values)
        .and(&reaction.masked_values())
        .map_collect(|&w, &r| w * r);

    let numerator = sum_values(&weight_values.into_dyn(), &weight, plot_type)?;
    let denominator = sum_values(&weighted_reaction.into_dyn(), &weight, plot_type)?;

    let data = Zip::from(&numerator.data)
        .and(&denominator.data)
        .map_collect(|&n, &d| if d == 0.0 { f64::NAN } else { n / d });

    log::info!(
        "Computed {plot_type} lifetime of '{}' over {region}: shape {:?}",
        reaction.name,
        data.shape()
    );
    Ok(Reduced {
        data,
        dimensions: numerator.dimensions,
    })
}
