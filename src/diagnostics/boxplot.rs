//! Relative change per kelvin of warming, grouped for boxplots
//!
//! For every variable and every configured pair of variable groups (e.g. a
//! historical and a scenario period of the high-ECS models), each dataset
//! contributes `100 * (x1 - x0) / |x0| / (tas1 - tas0)`. The values are
//! summarised per (variable, group) with the statistics a boxplot draws.

use crate::config::DiagnosticSettings;
use crate::errors::{DiagError, Result};
use crate::metadata::{group_metadata, select_metadata, DatasetMetadata};
use crate::paths::diagnostic_filename;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TAS: &str = "tas";

/// Loads the (scalar) value of an input dataset
pub trait ScalarLoader {
    /// # Errors
    ///
    /// Implementations fail if the dataset cannot be read.
    fn load_scalar(&self, metadata: &DatasetMetadata) -> Result<f64>;
}

/// One dataset's contribution to a box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxplotRecord {
    #[serde(rename = "Variable")]
    pub variable: String,
    #[serde(rename = "Group")]
    pub group: String,
    #[serde(rename = "Dataset")]
    pub dataset: String,
    #[serde(rename = "Data")]
    pub data: f64,
}

/// Summary statistics of one box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub variable: String,
    pub group: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Smallest value within 1.5 IQR below Q1
    pub whisker_low: f64,
    /// Largest value within 1.5 IQR above Q3
    pub whisker_high: f64,
}

/// Paths and content written by [`run_boxplot`]
#[derive(Debug, Clone)]
pub struct BoxplotOutputs {
    pub records_path: PathBuf,
    pub stats_path: PathBuf,
    pub records: Vec<BoxplotRecord>,
    pub stats: Vec<BoxStats>,
}

fn select_one(
    input: &[DatasetMetadata],
    short_name: &str,
    dataset: &str,
    group_suffix: &str,
) -> Result<DatasetMetadata> {
    let variable_group = format!("{short_name}_{group_suffix}");
    select_metadata(
        input,
        &[
            ("short_name", short_name),
            ("dataset", dataset),
            ("variable_group", &variable_group),
        ],
    )
    .into_iter()
    .next()
    .ok_or_else(|| DiagError::DataNotAvailable {
        short_name: short_name.to_string(),
        dataset: dataset.to_string(),
        group: group_suffix.to_string(),
    })
}

/// Relative change of `dataset` between the two groups per kelvin of
/// near-surface warming, in %/K.
///
/// # Errors
///
/// Returns [`DiagError::DataNotAvailable`] if the second-period entry or
/// either `tas` entry of the dataset is missing.
pub fn relative_change_per_kelvin(
    input: &[DatasetMetadata],
    groups: &[String; 2],
    dataset: &DatasetMetadata,
    loader: &dyn ScalarLoader,
) -> Result<f64> {
    let name = dataset.require_str("dataset")?;
    let short_name = dataset.require_str("short_name")?;

    let second = select_one(input, &short_name, &name, &groups[1])?;
    let tas_first = select_one(input, TAS, &name, &groups[0])?;
    let tas_second = select_one(input, TAS, &name, &groups[1])?;

    let x0 = loader.load_scalar(dataset)?;
    let x1 = loader.load_scalar(&second)?;
    let warming = loader.load_scalar(&tas_second)? - loader.load_scalar(&tas_first)?;

    Ok(100.0 * ((x1 - x0) / x0.abs()) / warming)
}

/// Label of a group pair: second `_` token of the first group plus ` ECS`
#[must_use]
pub fn group_label(first_group: &str) -> String {
    let token = first_group.split('_').nth(1).unwrap_or(first_group);
    format!("{token} ECS")
}

fn variable_label(short_name: &str) -> &str {
    if short_name == "clivi" {
        "iwp"
    } else {
        short_name
    }
}

/// One record per (variable, group pair, dataset) combination.
///
/// # Errors
///
/// Fails if a configured group has no entries, if data of a dataset is
/// missing or if the loader fails.
pub fn collect_records(
    input: &[DatasetMetadata],
    settings: &DiagnosticSettings,
    loader: &dyn ScalarLoader,
) -> Result<Vec<BoxplotRecord>> {
    let variables = group_metadata(input, "short_name", None);
    let groups = group_metadata(input, "variable_group", Some("dataset"));
    let mut records = Vec::new();

    for short_name in variables.keys().flatten().filter(|v| *v != TAS) {
        log::info!("Processing variable {short_name}");

        for pair in &settings.group_by {
            log::info!("Processing group {} of variable {short_name}", pair[0]);
            let key = Some(format!("{short_name}_{}", pair[0]));
            let members = groups.get(&key).ok_or_else(|| DiagError::DataNotAvailable {
                short_name: short_name.clone(),
                dataset: "any dataset".to_string(),
                group: pair[0].clone(),
            })?;

            for dataset in members {
                let name = dataset.require_str("dataset")?;
                if settings.exclude_datasets.contains(&name) {
                    continue;
                }
                let data = relative_change_per_kelvin(input, pair, dataset, loader)?;
                records.push(BoxplotRecord {
                    variable: variable_label(short_name).to_string(),
                    group: group_label(&pair[0]),
                    dataset: name,
                    data,
                });
            }
        }
    }

    Ok(records)
}

/// Linear-interpolation quantile of sorted values
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// Box statistics per (variable, group); non-finite values are ignored.
#[must_use]
pub fn box_statistics(records: &[BoxplotRecord]) -> Vec<BoxStats> {
    let mut boxes: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.data.is_finite()) {
        boxes
            .entry((record.variable.as_str(), record.group.as_str()))
            .or_default()
            .push(record.data);
    }

    boxes
        .into_iter()
        .map(|((variable, group), mut values)| {
            values.sort_by(f64::total_cmp);
            let q1 = quantile(&values, 0.25);
            let q3 = quantile(&values, 0.75);
            let reach = 1.5 * (q3 - q1);
            let whisker_low = values
                .iter()
                .copied()
                .find(|&v| v >= q1 - reach)
                .unwrap_or(q1);
            let whisker_high = values
                .iter()
                .rev()
                .copied()
                .find(|&v| v <= q3 + reach)
                .unwrap_or(q3);

            BoxStats {
                variable: variable.to_string(),
                group: group.to_string(),
                count: values.len(),
                min: values[0],
                q1,
                median: quantile(&values, 0.5),
                q3,
                max: values[values.len() - 1],
                whisker_low,
                whisker_high,
            }
        })
        .collect()
}

/// Writes records with a leading row-index column.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn write_records_csv(path: &Path, records: &[BoxplotRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["", "Variable", "Group", "Dataset", "Data"])?;
    for (index, record) in records.iter().enumerate() {
        writer.write_record([
            index.to_string(),
            record.variable.clone(),
            record.group.clone(),
            record.dataset.clone(),
            record.data.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per box.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn write_stats_csv(path: &Path, stats: &[BoxStats]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in stats {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs the boxplot diagnostic over the settings' input data and writes
/// `boxplot_region_<filename_attach>.csv` and its `_stats.csv` companion
/// into the work directory.
///
/// # Errors
///
/// Fails on missing data, loader errors or write errors.
pub fn run_boxplot(settings: &DiagnosticSettings, loader: &dyn ScalarLoader) -> Result<BoxplotOutputs> {
    let input = settings.input_metadata();
    let records = collect_records(&input, settings, loader)?;
    let stats = box_statistics(&records);

    std::fs::create_dir_all(&settings.work_dir)?;
    let basename = format!("boxplot_region_{}", settings.filename_attach);
    let records_path = diagnostic_filename(&basename, settings, "csv");
    let stats_path = diagnostic_filename(&format!("{basename}_stats"), settings, "csv");

    write_records_csv(&records_path, &records)?;
    log::info!("Wrote {}", records_path.display());
    write_stats_csv(&stats_path, &stats)?;
    log::info!("Wrote {}", stats_path.display());

    Ok(BoxplotOutputs {
        records_path,
        stats_path,
        records,
        stats,
    })
}
