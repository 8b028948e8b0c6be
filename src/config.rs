//! Diagnostic settings supplied by the orchestrator
//!
//! The orchestrator writes one JSON settings document per diagnostic run. It
//! names the output directories, the preprocessed input files together with
//! their metadata, and the per-recipe options of the diagnostic.

use crate::errors::Result;
use crate::metadata::DatasetMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Datasets skipped by group diagnostics unless configured otherwise
pub const DEFAULT_EXCLUDED_DATASETS: [&str; 3] = ["MultiModelMean", "MultiModelP5", "MultiModelP95"];

/// Settings of a single diagnostic invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSettings {
    pub plot_dir: PathBuf,
    pub work_dir: PathBuf,

    #[serde(default = "default_output_file_type")]
    pub output_file_type: String,

    /// Input files keyed by filename
    #[serde(default)]
    pub input_data: BTreeMap<String, DatasetMetadata>,

    /// Template of the folder plots are stored in
    #[serde(default)]
    pub plot_folder: Option<String>,

    /// Template of plot file names
    #[serde(default)]
    pub plot_filename: Option<String>,

    /// Moving-average window such as `"10 years"`
    #[serde(default)]
    pub moving_average: Option<String>,

    /// Reference period `[start_year, end_year]` for anomalies
    #[serde(default)]
    pub anomaly: Option<Vec<i32>>,

    /// Pairs of variable-group suffixes to compare, e.g. `["ECS_high_hist", "ECS_high_scen"]`
    #[serde(default)]
    pub group_by: Vec<[String; 2]>,

    #[serde(default = "default_excluded_datasets")]
    pub exclude_datasets: Vec<String>,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub filename_attach: String,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub plot_type: Option<String>,

    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

fn default_output_file_type() -> String {
    "png".to_string()
}

fn default_excluded_datasets() -> Vec<String> {
    DEFAULT_EXCLUDED_DATASETS.iter().map(|s| s.to_string()).collect()
}

fn default_title() -> String {
    "Test".to_string()
}

impl DiagnosticSettings {
    /// Minimal settings with every option at its default
    pub fn new(plot_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            plot_dir: plot_dir.into(),
            work_dir: work_dir.into(),
            output_file_type: default_output_file_type(),
            input_data: BTreeMap::new(),
            plot_folder: None,
            plot_filename: None,
            moving_average: None,
            anomaly: None,
            group_by: Vec::new(),
            exclude_datasets: default_excluded_datasets(),
            title: default_title(),
            filename_attach: String::new(),
            region: None,
            plot_type: None,
            extra: BTreeMap::new(),
        }
    }

    /// Load settings from a JSON file
    ///
    /// The filename of every `input_data` entry is also recorded in its
    /// metadata under `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid settings JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)?;
        for (filename, meta) in &mut settings.input_data {
            if !meta.contains_key("filename") {
                meta.insert("filename", filename.as_str());
            }
        }
        log::info!(
            "Loaded settings from {} ({} input files)",
            path.display(),
            settings.input_data.len()
        );
        Ok(settings)
    }

    /// Metadata of all input files in filename order
    #[must_use]
    pub fn input_metadata(&self) -> Vec<DatasetMetadata> {
        self.input_data.values().cloned().collect()
    }
}
