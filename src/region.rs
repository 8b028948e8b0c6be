//! Vertical region extraction against the tropopause
//!
//! A field is masked outside the troposphere or the stratosphere by comparing
//! its vertical coordinate with a tropopause field broadcast to the full
//! (time, vertical, latitude, longitude) grid. The tropopause comes from the
//! best available source:
//!
//! - an instantaneous tropopause level (`tp_i`), compared against model
//!   level numbers, only on hybrid sigma-pressure grids;
//! - a tropopause-pressure diagnostic (`ptp`);
//! - the climatological tropopause `(300 - 215 cos²(lat)) * 100` Pa.
//!
//! The troposphere excludes the tropopause level, the stratosphere includes it.

use crate::errors::{DiagError, Result};
use crate::field::{Field, VerticalAxis};
use ndarray::{Array1, Array3, Array4, ArrayView4, Axis, Zip};
use std::fmt;
use std::str::FromStr;

/// Vertical region of the atmosphere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Below the tropopause, tropopause excluded
    Troposphere,
    /// Tropopause and above
    Stratosphere,
}

impl FromStr for Region {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TROP" | "TROPOSPHERE" => Ok(Self::Troposphere),
            "STRA" | "STRATOSPHERE" => Ok(Self::Stratosphere),
            _ => Err(DiagError::NotImplemented(format!("region '{s}' is not supported"))),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Troposphere => write!(f, "TROP"),
            Self::Stratosphere => write!(f, "STRA"),
        }
    }
}

impl Region {
    /// True if a point with vertical value `z` lies outside the region
    #[must_use]
    pub fn excludes(self, z: f64, tropopause: f64) -> bool {
        match self {
            Self::Troposphere => z <= tropopause,
            Self::Stratosphere => z > tropopause,
        }
    }
}

/// Optional tropopause inputs, each on a (time, latitude, longitude) grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TropopauseFields {
    /// Instantaneous tropopause as a model level number (`tp_i`)
    pub instantaneous: Option<Array3<f64>>,
    /// Tropopause pressure in Pa (`ptp`)
    pub pressure: Option<Array3<f64>>,
}

/// Where the tropopause used for masking came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TropopauseSource {
    InstantaneousLevel,
    Pressure,
    Climatological,
}

/// Climatological tropopause pressure in Pa at `latitude` degrees
#[must_use]
pub fn climatological_tropopause_pressure(latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos();
    (300.0 - 215.0 * cos_lat * cos_lat) * 100.0
}

/// Climatological tropopause broadcast across time and longitude
#[must_use]
pub fn climatological_tropopause(latitude: &Array1<f64>, ntime: usize, nlon: usize) -> Array3<f64> {
    let profile = latitude.mapv(climatological_tropopause_pressure);
    Array3::from_shape_fn((ntime, latitude.len(), nlon), |(_, j, _)| profile[j])
}

/// Vertical values and tropopause selected for a field
#[derive(Debug, Clone)]
pub struct TropopauseComparison {
    pub source: TropopauseSource,
    /// Vertical coordinate broadcast to the field's shape
    pub vertical: Array4<f64>,
    /// Tropopause on (time, latitude, longitude)
    pub tropopause: Array3<f64>,
}

/// Picks the vertical values and tropopause field to compare for `field`.
///
/// # Errors
///
/// Returns [`DiagError::UnsupportedCoordinate`] for vertical coordinates other
/// than air pressure and hybrid sigma-pressure, and a shape error if a
/// tropopause input is not on the field's (time, latitude, longitude) grid.
pub fn select_tropopause(field: &Field, tropopause: &TropopauseFields) -> Result<TropopauseComparison> {
    let (nt, _, ny, nx) = field.dim();
    let climatology = || climatological_tropopause(&field.latitude, nt, nx);

    let comparison = match &field.vertical {
        VerticalAxis::AirPressure(points) => {
            let vertical = broadcast_levels(points, field.dim())?;
            match &tropopause.pressure {
                Some(ptp) => TropopauseComparison {
                    source: TropopauseSource::Pressure,
                    vertical,
                    tropopause: ptp.clone(),
                },
                None => TropopauseComparison {
                    source: TropopauseSource::Climatological,
                    vertical,
                    tropopause: climatology(),
                },
            }
        }
        VerticalAxis::HybridSigmaPressure(hybrid) => {
            match (&tropopause.instantaneous, &tropopause.pressure) {
                (Some(tp_i), _) => TropopauseComparison {
                    source: TropopauseSource::InstantaneousLevel,
                    vertical: broadcast_levels(&hybrid.model_level_number, field.dim())?,
                    tropopause: tp_i.clone(),
                },
                (None, Some(ptp)) => TropopauseComparison {
                    source: TropopauseSource::Pressure,
                    vertical: hybrid.air_pressure(),
                    tropopause: ptp.clone(),
                },
                (None, None) => TropopauseComparison {
                    source: TropopauseSource::Climatological,
                    vertical: hybrid.air_pressure(),
                    tropopause: climatology(),
                },
            }
        }
        VerticalAxis::Other { standard_name, .. } => {
            return Err(DiagError::UnsupportedCoordinate(standard_name.clone()));
        }
    };

    if comparison.tropopause.dim() != (nt, ny, nx) {
        return Err(DiagError::ShapeMismatch {
            expected: vec![nt, ny, nx],
            actual: comparison.tropopause.shape().to_vec(),
        });
    }
    Ok(comparison)
}

/// Mask that is true where `field` lies outside `region`.
///
/// # Errors
///
/// See [`select_tropopause`].
pub fn region_mask(field: &Field, region: Region, tropopause: &TropopauseFields) -> Result<Array4<bool>> {
    let comparison = select_tropopause(field, tropopause)?;
    log::debug!(
        "Masking '{}' outside {region} using {:?} tropopause",
        field.name,
        comparison.source
    );

    let shape = field.dim();
    let columns = comparison.tropopause.view().insert_axis(Axis(1));
    let tropopause_4d: ArrayView4<f64> = columns
        .broadcast(shape)
        .ok_or_else(|| DiagError::ShapeMismatch {
            expected: field.data.shape().to_vec(),
            actual: comparison.tropopause.shape().to_vec(),
        })?;

    let mut mask = Array4::from_elem(shape, false);
    Zip::from(&mut mask)
        .and(&comparison.vertical)
        .and(&tropopause_4d)
        .par_for_each(|m, &z, &tp| *m = region.excludes(z, tp));
    Ok(mask)
}

/// Copy of `field` masked outside `region`, keeping its existing mask.
///
/// # Errors
///
/// See [`select_tropopause`].
pub fn extract_region(field: &Field, region: Region, tropopause: &TropopauseFields) -> Result<Field> {
    let mask = region_mask(field, region, tropopause)?;
    let extracted = field.masked_with(&mask)?;
    log::info!(
        "Extracted {region} from '{}': {} of {} points remain",
        field.name,
        extracted.valid_count(),
        extracted.mask.len()
    );
    Ok(extracted)
}

fn broadcast_levels(levels: &Array1<f64>, shape: (usize, usize, usize, usize)) -> Result<Array4<f64>> {
    let column = levels.view().into_shape((1, levels.len(), 1, 1))?;
    column
        .broadcast(shape)
        .map(|view| view.to_owned())
        .ok_or_else(|| DiagError::ShapeMismatch {
            expected: vec![shape.0, shape.1, shape.2, shape.3],
            actual: vec![levels.len()],
        })
}
