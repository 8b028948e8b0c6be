//! Masked statistical reductions
//!
//! This module provides reductions (mean, sum, min, max) over one or more axes
//! of gridded data, skipping masked and non-finite points.
//!
//! # Organization
//!
//! - [`operations`]: The supported operations and the reduction trait
//! - [`parallel`]: Parallel lane-wise implementations

pub mod operations;
pub mod parallel;

pub use operations::{masked_mean, MaskedReduction, StatOperation};
pub use parallel::{parallel_reduce_axes, parallel_reduce_axis};
