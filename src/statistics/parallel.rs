//! Parallel computation implementations for statistical operations
//!
//! The reduced axes are moved to the back and flattened, so every output cell
//! owns one contiguous lane that a rayon task reduces on its own.

use super::operations::StatOperation;
use crate::errors::{DiagError, Result};
use ndarray::{ArrayD, ArrayViewD, Zip};
use rayon::prelude::*;

/// Reduces one axis in parallel, skipping masked and non-finite values.
///
/// # Errors
///
/// Returns an error if the axis is out of bounds or the mask has another shape.
pub fn parallel_reduce_axis(
    data: &ArrayViewD<f64>,
    mask: Option<&ArrayViewD<bool>>,
    axis: usize,
    operation: StatOperation,
) -> Result<ArrayD<f64>> {
    parallel_reduce_axes(data, mask, &[axis], operation)
}

/// Reduces several axes at once in parallel.
///
/// The result keeps the remaining axes in their original order. Reducing over
/// all axes yields a 0-dimensional array.
///
/// # Errors
///
/// Returns an error if an axis is out of bounds or repeated, or if the mask
/// has another shape than the data.
pub fn parallel_reduce_axes(
    data: &ArrayViewD<f64>,
    mask: Option<&ArrayViewD<bool>>,
    axes: &[usize],
    operation: StatOperation,
) -> Result<ArrayD<f64>> {
    let ndim = data.ndim();
    let mut reduced: Vec<usize> = axes.to_vec();
    reduced.sort_unstable();
    reduced.dedup();
    if reduced.len() != axes.len() || reduced.iter().any(|&a| a >= ndim) {
        return Err(DiagError::StatisticsError(format!(
            "Axes {axes:?} are invalid for array with {ndim} dimensions"
        )));
    }

    let masked = match mask {
        Some(mask) => {
            if mask.shape() != data.shape() {
                return Err(DiagError::ShapeMismatch {
                    expected: data.shape().to_vec(),
                    actual: mask.shape().to_vec(),
                });
            }
            Zip::from(data)
                .and(mask)
                .map_collect(|&v, &m| if m { f64::NAN } else { v })
        }
        None => data.to_owned(),
    };

    let kept: Vec<usize> = (0..ndim).filter(|a| !reduced.contains(a)).collect();
    let kept_shape: Vec<usize> = kept.iter().map(|&a| data.shape()[a]).collect();
    let lane_len: usize = reduced.iter().map(|&a| data.shape()[a]).product();
    let output_size: usize = kept_shape.iter().product();

    let order: Vec<usize> = kept.iter().chain(reduced.iter()).copied().collect();
    let lanes = masked
        .permuted_axes(order)
        .as_standard_layout()
        .into_owned()
        .into_shape((output_size, lane_len))?;

    log::debug!(
        "Computing {} of {output_size} cells over axes {reduced:?} across {} threads",
        operation.as_str(),
        rayon::current_num_threads()
    );

    let result: Vec<f64> = (0..output_size)
        .into_par_iter()
        .map(|cell| operation.reduce(lanes.row(cell).iter().copied()))
        .collect();

    Ok(ArrayD::from_shape_vec(kept_shape, result)?)
}
