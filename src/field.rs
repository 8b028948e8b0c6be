//! Labeled 4-D fields
//!
//! A [`Field`] holds one variable on a (time, vertical, latitude, longitude)
//! grid together with its coordinates and a validity mask. It is the unit of
//! work for region extraction and the lifetime diagnostic.

use crate::errors::{DiagError, Result};
use crate::time::TimeAxis;
use ndarray::{Array1, Array3, Array4, Zip};

pub const AIR_PRESSURE: &str = "air_pressure";
pub const HYBRID_SIGMA_PRESSURE: &str = "atmosphere_hybrid_sigma_pressure_coordinate";
pub const MODEL_LEVEL_NUMBER: &str = "model_level_number";

/// Hybrid sigma-pressure levels: `p = ap + b * ps`
#[derive(Debug, Clone, PartialEq)]
pub struct HybridPressure {
    /// Pressure term per level (Pa)
    pub ap: Array1<f64>,
    /// Sigma term per level
    pub b: Array1<f64>,
    /// Surface pressure (time, latitude, longitude) in Pa
    pub surface_pressure: Array3<f64>,
    /// Model level index per level
    pub model_level_number: Array1<f64>,
}

impl HybridPressure {
    /// Air pressure derived on the full (time, level, latitude, longitude) grid
    #[must_use]
    pub fn air_pressure(&self) -> Array4<f64> {
        let (nt, ny, nx) = self.surface_pressure.dim();
        let nz = self.ap.len();
        Array4::from_shape_fn((nt, nz, ny, nx), |(t, k, j, i)| {
            self.ap[k] + self.b[k] * self.surface_pressure[[t, j, i]]
        })
    }
}

/// Vertical coordinate system of a field
#[derive(Debug, Clone, PartialEq)]
pub enum VerticalAxis {
    /// Pressure levels in Pa
    AirPressure(Array1<f64>),
    HybridSigmaPressure(HybridPressure),
    /// Any other coordinate, kept so callers can report it
    Other {
        standard_name: String,
        points: Array1<f64>,
    },
}

impl VerticalAxis {
    /// Classify a 1-D vertical coordinate by its standard name
    #[must_use]
    pub fn from_points(standard_name: &str, points: Array1<f64>) -> Self {
        if standard_name == AIR_PRESSURE {
            Self::AirPressure(points)
        } else {
            Self::Other {
                standard_name: standard_name.to_string(),
                points,
            }
        }
    }

    #[must_use]
    pub fn standard_name(&self) -> &str {
        match self {
            Self::AirPressure(_) => AIR_PRESSURE,
            Self::HybridSigmaPressure(_) => HYBRID_SIGMA_PRESSURE,
            Self::Other { standard_name, .. } => standard_name,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::AirPressure(points) | Self::Other { points, .. } => points.len(),
            Self::HybridSigmaPressure(hybrid) => hybrid.ap.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A variable on a (time, vertical, latitude, longitude) grid
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub units: String,
    pub data: Array4<f32>,
    /// True where the value is missing or masked out
    pub mask: Array4<bool>,
    pub time: TimeAxis,
    pub vertical: VerticalAxis,
    pub latitude: Array1<f64>,
    pub longitude: Array1<f64>,
    /// Dimension names as stored on disk
    pub dimension_names: [String; 4],
}

impl Field {
    /// Build a field, checking every coordinate against the data shape.
    ///
    /// Non-finite values start out masked.
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::ShapeMismatch`] if a coordinate does not match
    /// its data dimension.
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        data: Array4<f32>,
        time: TimeAxis,
        vertical: VerticalAxis,
        latitude: Array1<f64>,
        longitude: Array1<f64>,
    ) -> Result<Self> {
        let (nt, nz, ny, nx) = data.dim();
        let actual = vec![time.len(), vertical.len(), latitude.len(), longitude.len()];
        if actual != [nt, nz, ny, nx] {
            return Err(DiagError::ShapeMismatch {
                expected: data.shape().to_vec(),
                actual,
            });
        }
        if let VerticalAxis::HybridSigmaPressure(hybrid) = &vertical {
            check_hybrid(hybrid, (nt, nz, ny, nx))?;
        }

        let mask = data.mapv(|v| !v.is_finite());
        Ok(Self {
            name: name.into(),
            units: units.into(),
            data,
            mask,
            time,
            vertical,
            latitude,
            longitude,
            dimension_names: [
                "time".to_string(),
                "lev".to_string(),
                "lat".to_string(),
                "lon".to_string(),
            ],
        })
    }

    /// Replace the on-disk dimension names
    #[must_use]
    pub fn with_dimension_names(mut self, names: [String; 4]) -> Self {
        self.dimension_names = names;
        self
    }

    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    /// Copy of the field with `mask` added to the existing mask
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::ShapeMismatch`] if `mask` has a different shape.
    pub fn masked_with(&self, mask: &Array4<bool>) -> Result<Self> {
        if mask.dim() != self.mask.dim() {
            return Err(DiagError::ShapeMismatch {
                expected: self.mask.shape().to_vec(),
                actual: mask.shape().to_vec(),
            });
        }
        let mut out = self.clone();
        Zip::from(&mut out.mask).and(mask).for_each(|m, &extra| *m |= extra);
        Ok(out)
    }

    /// Data as f64 with masked points set to NaN
    #[must_use]
    pub fn masked_values(&self) -> Array4<f64> {
        let mut values = self.data.mapv(f64::from);
        Zip::from(&mut values).and(&self.mask).for_each(|v, &m| {
            if m {
                *v = f64::NAN;
            }
        });
        values
    }

    /// Number of unmasked points
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }
}

fn check_hybrid(hybrid: &HybridPressure, (nt, nz, ny, nx): (usize, usize, usize, usize)) -> Result<()> {
    let levels = [hybrid.b.len(), hybrid.model_level_number.len()];
    if levels.iter().any(|&n| n != nz) {
        return Err(DiagError::ShapeMismatch {
            expected: vec![nz, nz],
            actual: levels.to_vec(),
        });
    }
    if hybrid.surface_pressure.dim() != (nt, ny, nx) {
        return Err(DiagError::ShapeMismatch {
            expected: vec![nt, ny, nx],
            actual: hybrid.surface_pressure.shape().to_vec(),
        });
    }
    Ok(())
}
