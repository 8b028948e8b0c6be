//! Core statistical operations and traits
//!
//! This module defines the fundamental types and traits for statistical operations.

use crate::errors::{DiagError, Result};
use ndarray::{ArrayD, Dimension};
use std::str::FromStr;

/// Supported statistical operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOperation {
    /// Arithmetic mean
    Mean,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl StatOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Min => "minimum",
            Self::Max => "maximum",
        }
    }

    /// Reduce the valid values of one lane.
    ///
    /// Returns NaN if the lane has no valid value.
    pub fn reduce<I: IntoIterator<Item = f64>>(self, values: I) -> f64 {
        let mut count = 0_usize;
        let mut acc = match self {
            Self::Mean | Self::Sum => 0.0,
            Self::Min => f64::INFINITY,
            Self::Max => f64::NEG_INFINITY,
        };

        for value in values.into_iter().filter(|v| v.is_finite()) {
            count += 1;
            acc = match self {
                Self::Mean | Self::Sum => acc + value,
                Self::Min => acc.min(value),
                Self::Max => acc.max(value),
            };
        }

        match (self, count) {
            (_, 0) => f64::NAN,
            (Self::Mean, n) => acc / n as f64,
            _ => acc,
        }
    }
}

impl FromStr for StatOperation {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            other => Err(DiagError::NotImplemented(format!(
                "statistical operation '{other}' is not supported"
            ))),
        }
    }
}

/// Mean of the finite values, `None` if there are none
#[must_use]
pub fn masked_mean<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<f64> {
    let mean = StatOperation::Mean.reduce(values.into_iter().copied());
    (!mean.is_nan()).then_some(mean)
}

/// Trait for types that can perform masked statistical reductions
///
/// Masked and non-finite points are skipped; output cells without any valid
/// input are NaN.
pub trait MaskedReduction {
    /// Perform a reduction along a single axis
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The axis is out of bounds for the array
    /// - The mask does not have the data's shape
    fn reduce_along_axis(
        &self,
        mask: Option<&ArrayD<bool>>,
        axis: usize,
        operation: StatOperation,
    ) -> Result<ArrayD<f64>>;

    /// Perform a reduction over several axes
    ///
    /// # Errors
    ///
    /// Same as [`reduce_along_axis`](Self::reduce_along_axis); repeated axes
    /// are an error as well.
    fn reduce_along_axes(
        &self,
        mask: Option<&ArrayD<bool>>,
        axes: &[usize],
        operation: StatOperation,
    ) -> Result<ArrayD<f64>>;
}

impl<D: Dimension> MaskedReduction for ndarray::Array<f64, D> {
    fn reduce_along_axis(
        &self,
        mask: Option<&ArrayD<bool>>,
        axis: usize,
        operation: StatOperation,
    ) -> Result<ArrayD<f64>> {
        let data = self.view().into_dyn();
        super::parallel::parallel_reduce_axis(&data, mask.map(|m| m.view()).as_ref(), axis, operation)
    }

    fn reduce_along_axes(
        &self,
        mask: Option<&ArrayD<bool>>,
        axes: &[usize],
        operation: StatOperation,
    ) -> Result<ArrayD<f64>> {
        let data = self.view().into_dyn();
        super::parallel::parallel_reduce_axes(&data, mask.map(|m| m.view()).as_ref(), axes, operation)
    }
}
