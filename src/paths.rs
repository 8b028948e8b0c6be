//! Output path helpers for diagnostics
//!
//! Plot folders and file names are templates resolved with [`crate::tags`]
//! against the metadata of the variable being plotted. Data files and plots
//! without a template go straight into the work and plot directories.

use crate::config::DiagnosticSettings;
use crate::errors::{DiagError, Result};
use crate::metadata::DatasetMetadata;
use crate::tags::replace_tags;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_PLOT_FOLDER: &str = "{plot_dir}/../../{dataset}/{exp}/{modeling_realm}/{real_name}";
pub const DEFAULT_PLOT_FILENAME: &str = "{plot_type}_{real_name}_{dataset}_{mip}_{exp}_{ensemble}";

const AGGREGATION_SUFFIXES: [&str; 4] = ["Ymean", "Ysum", "mean", "sum"];

/// Variable name with aggregation suffixes (`Ymean`, `Ysum`, `mean`, `sum`) removed
#[must_use]
pub fn real_name(variable_group: &str) -> String {
    let mut name = variable_group.to_string();
    for suffix in AGGREGATION_SUFFIXES {
        if name.ends_with(suffix) {
            name = name.replace(suffix, "");
        }
    }
    name
}

/// `work_dir/<basename>.<extension>`
#[must_use]
pub fn diagnostic_filename(basename: &str, settings: &DiagnosticSettings, extension: &str) -> PathBuf {
    settings.work_dir.join(format!("{basename}.{extension}"))
}

/// `plot_dir/<basename>.<output_file_type>`
#[must_use]
pub fn plot_filename(basename: &str, settings: &DiagnosticSettings) -> PathBuf {
    settings
        .plot_dir
        .join(format!("{basename}.{}", settings.output_file_type))
}

/// Plot folder and file name templates of a diagnostic
#[derive(Debug, Clone)]
pub struct PlotPaths {
    folder_template: String,
    filename_template: String,
    output_file_type: String,
}

impl PlotPaths {
    /// Build the templates from settings.
    ///
    /// `{plot_dir}` is substituted up front and the folder template is made
    /// absolute, so every later resolution starts with `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory is needed and cannot be read.
    pub fn from_settings(settings: &DiagnosticSettings) -> Result<Self> {
        let folder = settings
            .plot_folder
            .as_deref()
            .unwrap_or(DEFAULT_PLOT_FOLDER)
            .replace("{plot_dir}", &settings.plot_dir.to_string_lossy());
        let folder = absolute_lexical(Path::new(&folder))?;

        Ok(Self {
            folder_template: folder.to_string_lossy().into_owned(),
            filename_template: settings
                .plot_filename
                .clone()
                .unwrap_or_else(|| DEFAULT_PLOT_FILENAME.to_string()),
            output_file_type: settings.output_file_type.clone(),
        })
    }

    #[must_use]
    pub fn folder_template(&self) -> &str {
        &self.folder_template
    }

    /// Resolve and create the folder plots of `info` go in.
    ///
    /// # Errors
    ///
    /// Fails if `info` lacks `variable_group` or a tag of the template, or
    /// if the directory cannot be created.
    pub fn plot_folder(&self, info: &DatasetMetadata) -> Result<PathBuf> {
        let info = with_default(info, "real_name", real_name(&info.require_str("variable_group")?));
        let mut folder = expand_vars(&expand_user(&first_resolved(&self.folder_template, &info)?));
        // tag resolution strips the leading slash
        if self.folder_template.starts_with('/') && !folder.starts_with('/') {
            folder.insert(0, '/');
        }

        let folder = PathBuf::from(folder);
        if !folder.is_dir() {
            std::fs::create_dir_all(&folder)?;
            log::debug!("Created plot folder {}", folder.display());
        }
        Ok(folder)
    }

    /// Resolve the plot file name for `plot_type`.
    ///
    /// # Errors
    ///
    /// Fails if `info` lacks `variable_group` or a tag of the template.
    pub fn plot_name(&self, plot_type: &str, info: &DatasetMetadata, add_ext: bool) -> Result<String> {
        let info = with_default(info, "plot_type", plot_type.to_string());
        let info = with_default(&info, "real_name", real_name(&info.require_str("variable_group")?));
        let name = first_resolved(&self.filename_template, &info)?;
        Ok(if add_ext { self.add_file_extension(&name) } else { name })
    }

    /// Full path of the plot: folder joined with file name.
    ///
    /// # Errors
    ///
    /// See [`plot_folder`](Self::plot_folder) and [`plot_name`](Self::plot_name).
    pub fn plot_path(&self, plot_type: &str, info: &DatasetMetadata, add_ext: bool) -> Result<PathBuf> {
        Ok(self
            .plot_folder(info)?
            .join(self.plot_name(plot_type, info, add_ext)?))
    }

    #[must_use]
    pub fn add_file_extension(&self, filename: &str) -> String {
        format!("{filename}.{}", self.output_file_type)
    }
}

/// Metadata wins over the default, as diagnostics merge `{default, **info}`.
fn with_default(info: &DatasetMetadata, key: &str, value: String) -> DatasetMetadata {
    if info.contains_key(key) {
        info.clone()
    } else {
        info.clone().with(key, value)
    }
}

fn first_resolved(template: &str, info: &DatasetMetadata) -> Result<String> {
    replace_tags(&[template], info)?
        .into_iter()
        .next()
        .ok_or_else(|| DiagError::EmptyTemplate(template.to_string()))
}

/// Absolute path with `.` and `..` removed without touching the file system
/// Replaces a leading `~` with `$HOME`; `~user` forms are left alone.
#[must_use]
pub fn expand_user(path: &str) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return path.to_string();
    }
    match std::env::var("HOME") {
        Ok(home) => format!("{}{rest}", home.trim_end_matches('/')),
        Err(_) => path.to_string(),
    }
}

/// Substitutes `$NAME` and `${NAME}` with environment variables.
///
/// Unset variables and malformed references stay as written.
#[must_use]
pub fn expand_vars(path: &str) -> String {
    let is_name = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, reference_len) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after.find(|c: char| !is_name(c)).unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        let value = (!name.is_empty() && name.chars().all(is_name))
            .then(|| std::env::var(name).ok())
            .flatten();
        match value {
            Some(value) => {
                out.push_str(&value);
                rest = &after[reference_len..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn absolute_lexical(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
