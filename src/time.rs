//! CF time axis decoding
//!
//! Time coordinates are stored as offsets such as `days since 1850-01-01`
//! under one of the CF calendars. Diagnostics need calendar dates (for
//! anomaly reference periods) and fractional positions in days, months or
//! years (for moving-average windows).

use crate::errors::{DiagError, Result};
use chrono::{Datelike, NaiveDate};
use ndarray::Array1;
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;

const NOLEAP_MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP_MONTH_DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// CF calendars understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// Proleptic Gregorian (`standard`, `gregorian`, `proleptic_gregorian`)
    Standard,
    /// `noleap` / `365_day`
    NoLeap,
    /// `all_leap` / `366_day`
    AllLeap,
    /// `360_day`: twelve months of 30 days
    Day360,
}

impl FromStr for Calendar {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "standard" | "gregorian" | "proleptic_gregorian" => Ok(Self::Standard),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            other => Err(DiagError::InvalidTimeUnits(format!("unsupported calendar '{other}'"))),
        }
    }
}

impl Calendar {
    /// Length of `month` (1-12); months out of range have no days
    #[must_use]
    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        if !(1..=12).contains(&month) {
            return 0;
        }
        match self {
            Self::Day360 => 30,
            Self::NoLeap => NOLEAP_MONTH_DAYS[(month - 1) as usize],
            Self::AllLeap => ALL_LEAP_MONTH_DAYS[(month - 1) as usize],
            Self::Standard => {
                if month == 2 && is_gregorian_leap(year) {
                    29
                } else {
                    NOLEAP_MONTH_DAYS[(month - 1) as usize]
                }
            }
        }
    }

    #[must_use]
    pub fn days_in_year(self, year: i32) -> u32 {
        (1..=12).map(|m| self.days_in_month(year, m)).sum()
    }

    /// Last day of the year, used for closed reference periods
    #[must_use]
    pub fn last_day_of_year(self, year: i32) -> CalendarDate {
        CalendarDate::new(year, 12, self.days_in_month(year, 12))
    }

    /// Day count of `date` since an arbitrary but fixed origin
    fn day_number(self, year: i32, month: u32, day: u32) -> Result<i64> {
        if !(1..=12).contains(&month) || day == 0 || day > self.days_in_month(year, month) {
            return Err(DiagError::InvalidTimeUnits(format!(
                "invalid date {year}-{month}-{day}"
            )));
        }
        let in_year: i64 = (1..month)
            .map(|m| i64::from(self.days_in_month(year, m)))
            .sum::<i64>()
            + i64::from(day)
            - 1;
        match self {
            Self::Standard => NaiveDate::from_ymd_opt(year, month, day)
                .map(|d| i64::from(d.num_days_from_ce()))
                .ok_or_else(|| DiagError::InvalidTimeUnits(format!("invalid date {year}-{month}-{day}"))),
            Self::NoLeap => Ok(i64::from(year) * 365 + in_year),
            Self::AllLeap => Ok(i64::from(year) * 366 + in_year),
            Self::Day360 => Ok(i64::from(year) * 360 + in_year),
        }
    }

    fn from_day_number(self, days: i64) -> Result<(i32, u32, u32)> {
        let fixed_year_length = match self {
            Self::Standard => {
                let days = i32::try_from(days)
                    .map_err(|_| DiagError::InvalidTimeUnits(format!("day {days} out of range")))?;
                let date = NaiveDate::from_num_days_from_ce_opt(days)
                    .ok_or_else(|| DiagError::InvalidTimeUnits(format!("day {days} out of range")))?;
                return Ok((date.year(), date.month(), date.day()));
            }
            Self::NoLeap => 365,
            Self::AllLeap => 366,
            Self::Day360 => 360,
        };

        let year = i32::try_from(days.div_euclid(fixed_year_length))
            .map_err(|_| DiagError::InvalidTimeUnits(format!("day {days} out of range")))?;
        let mut remaining = days.rem_euclid(fixed_year_length);
        let mut month = 1;
        loop {
            let length = i64::from(self.days_in_month(year, month));
            if remaining < length || month == 12 {
                break;
            }
            remaining -= length;
            month += 1;
        }
        Ok((year, month, remaining as u32 + 1))
    }
}

fn is_gregorian_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// A date (and time of day) in some calendar; orders chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarDate {
    #[must_use]
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    fn seconds_of_day(&self) -> f64 {
        f64::from(self.hour * 3600 + self.minute * 60 + self.second)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Step of a CF time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStep {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeStep {
    const fn seconds(self) -> f64 {
        match self {
            Self::Days => SECONDS_PER_DAY,
            Self::Hours => 3600.0,
            Self::Minutes => 60.0,
            Self::Seconds => 1.0,
        }
    }
}

/// Parsed `"<step> since <reference>"` units under a calendar
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub step: TimeStep,
    pub reference: CalendarDate,
    pub calendar: Calendar,
}

impl TimeUnits {
    /// Parse CF units such as `days since 1850-01-01 00:00:00`
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::InvalidTimeUnits`] for unknown steps, malformed
    /// reference dates or unsupported calendars.
    pub fn parse(units: &str, calendar: &str) -> Result<Self> {
        let invalid = || DiagError::InvalidTimeUnits(units.to_string());

        let (step, reference) = units.split_once(" since ").ok_or_else(invalid)?;
        let step = match step.trim().to_lowercase().as_str() {
            "days" | "day" | "d" => TimeStep::Days,
            "hours" | "hour" | "hrs" | "hr" | "h" => TimeStep::Hours,
            "minutes" | "minute" | "mins" | "min" => TimeStep::Minutes,
            "seconds" | "second" | "secs" | "sec" | "s" => TimeStep::Seconds,
            _ => return Err(invalid()),
        };

        let reference = reference.trim().replace('T', " ");
        let mut parts = reference.split_whitespace();
        let date_part = parts.next().ok_or_else(invalid)?;
        let time_part = parts.next().unwrap_or("00:00:00");

        let ymd: Vec<&str> = date_part.split('-').collect();
        let [year, month, day] = ymd.as_slice() else {
            return Err(invalid());
        };
        let hms: Vec<f64> = time_part
            .split(':')
            .map(|p| p.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<_>>()?;

        let reference = CalendarDate {
            year: year.parse().map_err(|_| invalid())?,
            month: month.parse().map_err(|_| invalid())?,
            day: day.parse().map_err(|_| invalid())?,
            hour: hms.first().copied().unwrap_or(0.0) as u32,
            minute: hms.get(1).copied().unwrap_or(0.0) as u32,
            second: hms.get(2).copied().unwrap_or(0.0) as u32,
        };
        if !(1..=12).contains(&reference.month) || reference.day == 0 {
            return Err(invalid());
        }

        Ok(Self {
            step,
            reference,
            calendar: calendar.parse()?,
        })
    }

    fn reference_seconds(&self) -> Result<f64> {
        let r = &self.reference;
        let days = self.calendar.day_number(r.year, r.month, r.day)?;
        Ok(days as f64 * SECONDS_PER_DAY + r.seconds_of_day())
    }

    /// Calendar date of an offset
    ///
    /// # Errors
    ///
    /// Returns an error if the date falls outside the representable range.
    pub fn to_date(&self, value: f64) -> Result<CalendarDate> {
        let total = self.reference_seconds()? + value * self.step.seconds();
        let days = (total / SECONDS_PER_DAY).floor();
        let seconds = (total - days * SECONDS_PER_DAY).round() as u32;
        let (year, month, day) = self.calendar.from_day_number(days as i64)?;
        Ok(CalendarDate {
            year,
            month,
            day,
            hour: seconds / 3600,
            minute: (seconds % 3600) / 60,
            second: seconds % 60,
        })
    }

    /// Offset of a calendar date
    ///
    /// # Errors
    ///
    /// Returns an error if the date does not exist in the calendar.
    pub fn to_value(&self, date: &CalendarDate) -> Result<f64> {
        let days = self.calendar.day_number(date.year, date.month, date.day)?;
        let total = days as f64 * SECONDS_PER_DAY + date.seconds_of_day();
        Ok((total - self.reference_seconds()?) / self.step.seconds())
    }

    /// Position of a date measured in days since the calendar origin
    ///
    /// # Errors
    ///
    /// Returns an error if the date does not exist in the calendar.
    pub fn day_position(&self, date: &CalendarDate) -> Result<f64> {
        let days = self.calendar.day_number(date.year, date.month, date.day)?;
        Ok(days as f64 + date.seconds_of_day() / SECONDS_PER_DAY)
    }

    /// Position of a date measured in (fractional) months
    #[must_use]
    pub fn month_position(&self, date: &CalendarDate) -> f64 {
        let into_month = f64::from(date.day - 1) + date.seconds_of_day() / SECONDS_PER_DAY;
        let month_length = f64::from(self.calendar.days_in_month(date.year, date.month));
        f64::from(date.year) * 12.0 + f64::from(date.month - 1) + into_month / month_length
    }

    /// Position of a date measured in (fractional) years
    #[must_use]
    pub fn year_position(&self, date: &CalendarDate) -> f64 {
        let into_year: f64 = (1..date.month)
            .map(|m| f64::from(self.calendar.days_in_month(date.year, m)))
            .sum::<f64>()
            + f64::from(date.day - 1)
            + date.seconds_of_day() / SECONDS_PER_DAY;
        f64::from(date.year) + into_year / f64::from(self.calendar.days_in_year(date.year))
    }
}

/// Time coordinate of a field or series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub points: Array1<f64>,
    pub units: String,
    pub calendar: String,
}

impl TimeAxis {
    pub fn new(points: Array1<f64>, units: impl Into<String>, calendar: impl Into<String>) -> Self {
        Self {
            points,
            units: units.into(),
            calendar: calendar.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Parsed units of this axis
    ///
    /// # Errors
    ///
    /// See [`TimeUnits::parse`].
    pub fn parsed_units(&self) -> Result<TimeUnits> {
        TimeUnits::parse(&self.units, &self.calendar)
    }

    /// Calendar dates of all points
    ///
    /// # Errors
    ///
    /// See [`TimeUnits::parse`] and [`TimeUnits::to_date`].
    pub fn dates(&self) -> Result<Vec<CalendarDate>> {
        let units = self.parsed_units()?;
        self.points.iter().map(|&p| units.to_date(p)).collect()
    }
}
