//! Time series diagnostics: moving averages and anomalies
//!
//! Works on 1-D series (time only), as produced by area or volume averaging
//! preprocessors.

use crate::errors::{DiagError, Result};
use crate::statistics::masked_mean;
use crate::time::{Calendar, CalendarDate, TimeAxis, TimeUnits};
use ndarray::Array1;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

/// A 1-D series over time
#[derive(Debug, Clone, PartialEq)]
pub struct Timeseries {
    pub name: String,
    pub units: String,
    pub time: TimeAxis,
    pub values: Array1<f64>,
}

impl Timeseries {
    /// # Errors
    ///
    /// Returns [`DiagError::ShapeMismatch`] if time and values differ in length.
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        time: TimeAxis,
        values: Array1<f64>,
    ) -> Result<Self> {
        if time.len() != values.len() {
            return Err(DiagError::ShapeMismatch {
                expected: vec![time.len()],
                actual: vec![values.len()],
            });
        }
        Ok(Self {
            name: name.into(),
            units: units.into(),
            time,
            values,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn with_values(&self, values: Array1<f64>) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }
}

/// Unit of a moving-average window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    Days,
    Months,
    Years,
}

/// Total width of a moving-average window, e.g. `10 years`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingWindow {
    pub width: u32,
    pub unit: WindowUnit,
}

impl FromStr for MovingWindow {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [width, unit] = parts.as_slice() else {
            return Err(DiagError::InvalidWindow(s.to_string()));
        };
        let width = width
            .parse::<u32>()
            .map_err(|_| DiagError::InvalidWindow(s.to_string()))?;
        let unit = match *unit {
            "days" | "day" | "dy" => WindowUnit::Days,
            "months" | "month" | "mn" => WindowUnit::Months,
            "years" | "yrs" | "year" | "yr" => WindowUnit::Years,
            other => {
                return Err(DiagError::InvalidWindow(format!("units '{other}' in '{s}'")));
            }
        };
        Ok(Self { width, unit })
    }
}

impl MovingWindow {
    /// Half of the window width, the reach on either side of a point
    #[must_use]
    pub fn half_width(&self) -> f64 {
        f64::from(self.width) / 2.0
    }

    fn position(&self, units: &TimeUnits, date: &CalendarDate) -> Result<f64> {
        Ok(match self.unit {
            WindowUnit::Days => units.day_position(date)?,
            WindowUnit::Months => units.month_position(date),
            WindowUnit::Years => units.year_position(date),
        })
    }
}

/// Moving average over a window centred on every point.
///
/// Each output value is the mean of all valid values within half the window
/// width of the point, ends included. Near the start and end of the series
/// only the available values are averaged.
///
/// # Errors
///
/// Fails if the time axis cannot be decoded.
pub fn moving_average(series: &Timeseries, window: &MovingWindow) -> Result<Timeseries> {
    let units = series.time.parsed_units()?;
    let positions: Vec<f64> = series
        .time
        .dates()?
        .iter()
        .map(|date| window.position(&units, date))
        .collect::<Result<_>>()?;

    let half = window.half_width();
    let averaged: Array1<f64> = positions
        .iter()
        .map(|&centre| {
            let in_window = positions
                .iter()
                .zip(series.values.iter())
                .filter(|&(&p, _)| p >= centre - half && p <= centre + half)
                .map(|(_, v)| v);
            masked_mean(in_window).unwrap_or(f64::NAN)
        })
        .collect();

    log::debug!(
        "Moving average of '{}' over {} {:?}",
        series.name,
        window.width,
        window.unit
    );
    Ok(series.with_values(averaged))
}

/// Subtracts the mean over a reference period.
///
/// The period runs from January 1st of the earliest year in `period` to
/// December 31st of the latest, both ends excluded. On a 360-day calendar
/// both ends move to day 30 of their month. Returns `None` if no point falls inside the period.
///
/// # Errors
///
/// Fails if `period` is empty or the time axis cannot be decoded.
pub fn calculate_anomaly(series: &Timeseries, period: &[i32]) -> Result<Option<Timeseries>> {
    let (Some(&first), Some(&last)) = (period.iter().min(), period.iter().max()) else {
        return Err(DiagError::StatisticsError(
            "anomaly period must name at least one year".to_string(),
        ));
    };

    let units = series.time.parsed_units()?;
    let (start, end) = match units.calendar {
        Calendar::Day360 => (CalendarDate::new(first, 1, 30), CalendarDate::new(last, 12, 30)),
        calendar => (CalendarDate::new(first, 1, 1), calendar.last_day_of_year(last)),
    };
    let t_start = units.to_value(&start)?;
    let t_end = units.to_value(&end)?;

    let selected: Vec<f64> = series
        .time
        .points
        .iter()
        .zip(series.values.iter())
        .filter(|&(&t, _)| t_start < t && t < t_end)
        .map(|(_, &v)| v)
        .collect();
    if selected.is_empty() {
        log::warn!("No data of '{}' within anomaly period {first}-{last}", series.name);
        return Ok(None);
    }

    let reference = masked_mean(&selected).unwrap_or(f64::NAN);
    log::debug!("Anomaly reference of '{}' for {first}-{last}: {reference}", series.name);
    Ok(Some(series.with_values(series.values.mapv(|v| v - reference))))
}

/// Smooths `series` with `window` and then takes the anomaly against
/// `period`, skipping whichever step is not requested.
///
/// The anomaly reference is the mean of the smoothed series. Returns `None`
/// if an anomaly was requested but no point falls inside the period.
///
/// # Errors
///
/// Fails if either step fails.
pub fn process_timeseries(
    series: &Timeseries,
    window: Option<&MovingWindow>,
    period: Option<&[i32]>,
) -> Result<Option<Timeseries>> {
    let smoothed = match window {
        Some(window) => moving_average(series, window)?,
        None => series.clone(),
    };
    match period {
        Some(period) => calculate_anomaly(&smoothed, period),
        None => Ok(Some(smoothed)),
    }
}

#[derive(Serialize)]
struct TimeseriesRow<'a> {
    time: f64,
    date: String,
    value: f64,
    units: &'a str,
}

/// Writes `series` as CSV with one `time,date,value,units` row per point.
///
/// # Errors
///
/// Fails if the time axis cannot be decoded or the file cannot be written.
pub fn write_timeseries_csv(series: &Timeseries, path: &Path) -> Result<()> {
    let dates = series.time.dates()?;
    let mut writer = csv::Writer::from_path(path)?;
    for ((&time, date), &value) in series.time.points.iter().zip(&dates).zip(series.values.iter()) {
        writer.serialize(TimeseriesRow {
            time,
            date: date.to_string(),
            value,
            units: &series.units,
        })?;
    }
    writer.flush()?;
    log::info!("Wrote {} points of '{}' to {}", series.len(), series.name, path.display());
    Ok(())
}
