//! NetCDF I/O for fields, tropopause inputs and diagnostic results
//!
//! Fields are read as (time, vertical, latitude, longitude) variables along
//! with their coordinate variables. Results are written to new NetCDF files
//! with the attributes of the source variable copied over.

use crate::diagnostics::{ScalarLoader, Timeseries};
use crate::errors::{DiagError, Result};
use crate::field::{Field, HybridPressure, VerticalAxis, AIR_PRESSURE, HYBRID_SIGMA_PRESSURE};
use crate::metadata::DatasetMetadata;
use crate::region::TropopauseFields;
use crate::statistics::masked_mean;
use crate::time::TimeAxis;
use chrono::Utc;
use ndarray::{Array1, Array3, Array4, ArrayD, Zip};
use netcdf::{create, AttributeValue, File, Variable, VariableMut};
use std::{fs, path::Path};

/// Fill value of written variables
pub const FILL_VALUE: f32 = 1.0e20;

const DEFAULT_CALENDAR: &str = "standard";
const PRESSURE_IN_HPA: [&str; 3] = ["hPa", "hpa", "mbar"];

fn find_variable<'f>(file: &'f File, name: &str) -> Result<Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| DiagError::VariableNotFound { var: name.to_string() })
}

fn attribute_string(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(value) => Some(value),
        _ => None,
    }
}

fn attribute_f64(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Floats(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

fn dimension_names(var: &Variable) -> Vec<String> {
    var.dimensions().iter().map(|d| d.name().to_string()).collect()
}

fn shape(var: &Variable) -> Vec<usize> {
    var.dimensions().iter().map(netcdf::Dimension::len).collect()
}

/// Values of `var` as f64 with `_FillValue`/`missing_value` replaced by NaN
fn read_values(var: &Variable) -> Result<Vec<f64>> {
    let fills: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| attribute_f64(var, name))
        .collect();
    let mut values = var.get_values::<f64, _>(..)?;
    for v in &mut values {
        if fills.contains(&*v) {
            *v = f64::NAN;
        }
    }
    Ok(values)
}

fn to_pascal(var: &Variable, values: Array1<f64>) -> Array1<f64> {
    match attribute_string(var, "units") {
        Some(units) if PRESSURE_IN_HPA.contains(&units.as_str()) => values * 100.0,
        _ => values,
    }
}

/// Coordinate values of dimension `dim`, or its indices without a coordinate variable
fn read_coordinate(file: &File, dim: &str, len: usize) -> Result<Array1<f64>> {
    match file.variable(dim) {
        Some(var) => Ok(Array1::from(var.get_values::<f64, _>(..)?)),
        None => {
            log::debug!("No coordinate variable for '{dim}', using indices");
            Ok(Array1::range(0.0, len as f64, 1.0))
        }
    }
}

fn read_3d(var: &Variable) -> Result<Array3<f64>> {
    let dims = shape(var);
    let [nt, ny, nx] = dims[..] else {
        return Err(DiagError::InvalidField(format!(
            "'{}' must have 3 dimensions (time, lat, lon), found {}",
            var.name(),
            dims.len()
        )));
    };
    Ok(Array3::from_shape_vec((nt, ny, nx), read_values(var)?)?)
}

fn read_vertical(file: &File, dim: &str, nz: usize) -> Result<VerticalAxis> {
    let Some(coord) = file.variable(dim) else {
        return Ok(VerticalAxis::from_points(dim, Array1::range(0.0, nz as f64, 1.0)));
    };
    let standard_name = attribute_string(&coord, "standard_name").unwrap_or_else(|| dim.to_string());
    let points = Array1::from(coord.get_values::<f64, _>(..)?);

    if standard_name == AIR_PRESSURE {
        return Ok(VerticalAxis::AirPressure(to_pascal(&coord, points)));
    }
    if standard_name != HYBRID_SIGMA_PRESSURE {
        return Ok(VerticalAxis::from_points(&standard_name, points));
    }

    let ap = match file.variable("ap") {
        Some(ap) => to_pascal(&ap, Array1::from(ap.get_values::<f64, _>(..)?)),
        None => {
            let a = Array1::from(find_variable(file, "a")?.get_values::<f64, _>(..)?);
            let p0 = find_variable(file, "p0")?;
            let p0 = to_pascal(&p0, Array1::from(p0.get_values::<f64, _>(..)?));
            a * p0.first().copied().unwrap_or(f64::NAN)
        }
    };
    let b = Array1::from(find_variable(file, "b")?.get_values::<f64, _>(..)?);
    let ps = find_variable(file, "ps")?;
    let surface_pressure = read_3d(&ps)?;
    let model_level_number = match file.variable("model_level_number") {
        Some(var) => Array1::from(var.get_values::<f64, _>(..)?),
        None => Array1::range(1.0, nz as f64 + 1.0, 1.0),
    };

    Ok(VerticalAxis::HybridSigmaPressure(HybridPressure {
        ap,
        b,
        surface_pressure,
        model_level_number,
    }))
}

fn read_time(file: &File, dim: &str, len: usize) -> Result<TimeAxis> {
    let points = read_coordinate(file, dim, len)?;
    let (units, calendar) = match file.variable(dim) {
        Some(var) => (
            attribute_string(&var, "units").unwrap_or_default(),
            attribute_string(&var, "calendar").unwrap_or_else(|| DEFAULT_CALENDAR.to_string()),
        ),
        None => (String::new(), DEFAULT_CALENDAR.to_string()),
    };
    Ok(TimeAxis::new(points, units, calendar))
}

/// Loads a (time, vertical, latitude, longitude) variable as a [`Field`].
///
/// Hybrid sigma-pressure levels need `ap` (or `a` and `p0`), `b` and `ps` in
/// the same file; `model_level_number` defaults to 1-based level indices.
///
/// # Errors
///
/// Fails if the variable is missing or not 4-D, or if a coordinate cannot
/// be read.
pub fn load_field(file: &File, var_name: &str) -> Result<Field> {
    let var = find_variable(file, var_name)?;
    let names = dimension_names(&var);
    let dims = shape(&var);
    let [nt, nz, ny, nx] = dims[..] else {
        return Err(DiagError::InvalidField(format!(
            "'{var_name}' must have 4 dimensions (time, vertical, lat, lon), found {}",
            dims.len()
        )));
    };

    log::info!("Loading '{var_name}' with shape {dims:?}");
    let values = read_values(&var)?;
    let data = Array4::from_shape_vec((nt, nz, ny, nx), values)?.mapv(|v| v as f32);

    let field = Field::new(
        var_name,
        attribute_string(&var, "units").unwrap_or_default(),
        data,
        read_time(file, &names[0], nt)?,
        read_vertical(file, &names[1], nz)?,
        read_coordinate(file, &names[2], ny)?,
        read_coordinate(file, &names[3], nx)?,
    )?;
    log::debug!(
        "'{var_name}' uses vertical coordinate '{}'",
        field.vertical.standard_name()
    );
    Ok(field.with_dimension_names([
        names[0].clone(),
        names[1].clone(),
        names[2].clone(),
        names[3].clone(),
    ]))
}

/// Loads the optional `tp_i` and `ptp` tropopause variables of `file`.
///
/// # Errors
///
/// Fails if a present variable is not 3-D or cannot be read.
pub fn load_tropopause(file: &File) -> Result<TropopauseFields> {
    let instantaneous = file.variable("tp_i").map(|var| read_3d(&var)).transpose()?;
    let pressure = file
        .variable("ptp")
        .map(|var| {
            let in_hpa = attribute_string(&var, "units")
                .is_some_and(|u| PRESSURE_IN_HPA.contains(&u.as_str()));
            read_3d(&var).map(|p| if in_hpa { p * 100.0 } else { p })
        })
        .transpose()?;

    log::debug!(
        "Tropopause inputs: tp_i={}, ptp={}",
        instantaneous.is_some(),
        pressure.is_some()
    );
    Ok(TropopauseFields {
        instantaneous,
        pressure,
    })
}

/// Loads a 1-D variable over time.
///
/// # Errors
///
/// Fails if the variable is missing or not 1-D.
pub fn load_timeseries(file: &File, var_name: &str) -> Result<Timeseries> {
    let var = find_variable(file, var_name)?;
    let names = dimension_names(&var);
    let [time_dim] = &names[..] else {
        return Err(DiagError::InvalidField(format!(
            "'{var_name}' must be a time series, found dimensions {names:?}"
        )));
    };
    let values = Array1::from(read_values(&var)?);
    let time = read_time(file, time_dim, values.len())?;
    Timeseries::new(
        var_name,
        attribute_string(&var, "units").unwrap_or_default(),
        time,
        values,
    )
}

/// Reads the value of a scalar dataset from the file named in its metadata.
///
/// The variable is the dataset's `short_name`; multi-valued variables
/// collapse to the mean of their valid values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCDFScalarLoader;

impl ScalarLoader for NetCDFScalarLoader {
    fn load_scalar(&self, metadata: &DatasetMetadata) -> Result<f64> {
        let filename = metadata.require_str("filename")?;
        let short_name = metadata.require_str("short_name")?;
        let file = netcdf::open(&filename)?;
        let values = read_values(&find_variable(&file, &short_name)?)?;
        Ok(masked_mean(&values).unwrap_or(f64::NAN))
    }
}

/// Writes fields and reductions next to the variable they were derived from
pub struct NetCDFWriter<'a> {
    input_file: &'a File,
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    pub fn new(input_file: &'a File, output_path: &'a Path) -> Self {
        Self {
            input_file,
            output_path,
        }
    }

    fn create_output(&self) -> Result<netcdf::FileMut> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        Ok(create(self.output_path)?)
    }

    /// Writes `field` with masked points set to [`FILL_VALUE`].
    ///
    /// # Errors
    ///
    /// Fails if the source variable is missing or the file cannot be written.
    pub fn write_field(&self, field: &Field) -> Result<()> {
        let orig_var = find_variable(self.input_file, &field.name)?;
        let mut file = self.create_output()?;
        let names = &field.dimension_names;
        let (nt, nz, ny, nx) = field.dim();

        for (name, len) in names.iter().zip([nt, nz, ny, nx]) {
            file.add_dimension(name, len)?;
        }

        let mut time = file.add_variable::<f64>(&names[0], &[names[0].as_str()])?;
        time.put(field.time.points.view(), ..)?;
        if !field.time.units.is_empty() {
            time.put_attribute("units", field.time.units.as_str())?;
        }
        time.put_attribute("calendar", field.time.calendar.as_str())?;

        let levels = match &field.vertical {
            VerticalAxis::AirPressure(points) | VerticalAxis::Other { points, .. } => points.clone(),
            VerticalAxis::HybridSigmaPressure(hybrid) => hybrid.model_level_number.clone(),
        };
        let mut vertical = file.add_variable::<f64>(&names[1], &[names[1].as_str()])?;
        vertical.put(levels.view(), ..)?;
        vertical.put_attribute("standard_name", field.vertical.standard_name())?;

        for (name, points, units) in [
            (&names[2], &field.latitude, "degrees_north"),
            (&names[3], &field.longitude, "degrees_east"),
        ] {
            let mut coord = file.add_variable::<f64>(name, &[name.as_str()])?;
            coord.put(points.view(), ..)?;
            coord.put_attribute("units", units)?;
        }

        let mut filled = field.data.clone();
        Zip::from(&mut filled).and(&field.mask).for_each(|v, &m| {
            if m {
                *v = FILL_VALUE;
            }
        });

        let dim_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut new_var = file.add_variable::<f32>(&field.name, &dim_refs)?;
        new_var.put_attribute("_FillValue", FILL_VALUE)?;
        new_var.put(filled.view(), ..)?;
        copy_attributes(&orig_var, &mut new_var)?;

        add_history(&mut file)?;
        log::info!("Wrote '{}' to {}", field.name, self.output_path.display());
        Ok(())
    }

    /// Writes a reduction of `original_var_name`; NaN cells become
    /// [`FILL_VALUE`]. Coordinates of kept dimensions are copied from the
    /// input file when present.
    ///
    /// # Errors
    ///
    /// Fails if the source variable is missing, `dim_names` does not match
    /// the data rank, or the file cannot be written.
    pub fn write_reduced(
        &self,
        data: &ArrayD<f64>,
        dim_names: &[String],
        var_name: &str,
        original_var_name: &str,
    ) -> Result<()> {
        if dim_names.len() != data.ndim() {
            return Err(DiagError::ShapeMismatch {
                expected: data.shape().to_vec(),
                actual: vec![dim_names.len()],
            });
        }
        let orig_var = find_variable(self.input_file, original_var_name)?;
        let mut file = self.create_output()?;

        for (dim_name, &dim_len) in dim_names.iter().zip(data.shape()) {
            file.add_dimension(dim_name, dim_len)?;
        }
        for dim_name in dim_names {
            if let Some(coord) = self.input_file.variable(dim_name) {
                let points = Array1::from(coord.get_values::<f64, _>(..)?);
                let mut new_coord = file.add_variable::<f64>(dim_name, &[dim_name.as_str()])?;
                new_coord.put(points.view(), ..)?;
                copy_attributes(&coord, &mut new_coord)?;
            }
        }

        let filled = data.mapv(|v| if v.is_finite() { v as f32 } else { FILL_VALUE });
        let dim_refs: Vec<&str> = dim_names.iter().map(String::as_str).collect();
        let mut new_var = file.add_variable::<f32>(var_name, &dim_refs)?;
        new_var.put_attribute("_FillValue", FILL_VALUE)?;
        new_var.put(filled.view(), ..)?;
        copy_attributes(&orig_var, &mut new_var)?;

        add_history(&mut file)?;
        log::info!("Wrote '{var_name}' to {}", self.output_path.display());
        Ok(())
    }
}

fn add_history(file: &mut netcdf::FileMut) -> Result<()> {
    file.add_attribute(
        "history",
        format!("Created by climdiag on {}", Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

/// Copies attributes except fill and missing values
fn copy_attributes(source: &Variable, target: &mut VariableMut) -> Result<()> {
    for attr in source
        .attributes()
        .filter(|a| a.name() != "_FillValue" && a.name() != "missing_value")
    {
        match attr.value()? {
            AttributeValue::Str(val) => {
                target.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Strs(vals) => {
                target.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Float(val) => {
                target.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Floats(vals) => {
                target.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Double(val) => {
                target.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Doubles(vals) => {
                target.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Int(val) => {
                target.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Ints(vals) => {
                target.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Short(val) => {
                target.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Shorts(vals) => {
                target.put_attribute(attr.name(), vals)?;
            }
            _ => {
                log::warn!("Skipped unsupported attribute type for '{}'", attr.name());
            }
        }
    }
    Ok(())
}
