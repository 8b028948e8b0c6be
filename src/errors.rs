//! Centralized error handling for climdiag
//!
//! Every fallible operation in the crate returns [`Result`]. Configuration
//! errors (missing tags, unsupported regions or coordinate systems) are
//! reported immediately and are never retried.

use thiserror::Error;

/// Main error type for climdiag operations
#[derive(Debug, Error)]
pub enum DiagError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Malformed JSON settings or metadata
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV output errors
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A path template references a tag the dataset metadata does not define
    #[error("Dataset key '{tag}' must be specified for {context}, check your recipe entry")]
    MissingTag { tag: String, context: String },

    /// A template expanded to an empty set (an empty list-valued tag)
    #[error("Template '{0}' resolved to no path")]
    EmptyTemplate(String),

    /// A metadata entry lacks a key the diagnostic needs
    #[error("Metadata key '{key}' missing in {context}")]
    MissingMetadataKey { key: String, context: String },

    /// No input matches the requested dataset/group combination
    #[error("No '{short_name}' data for '{dataset}' in '{group}' available")]
    DataNotAvailable {
        short_name: String,
        dataset: String,
        group: String,
    },

    /// Region, plot type or similar option that has no implementation
    #[error("{0}")]
    NotImplemented(String),

    /// Vertical coordinate system the region extractor cannot handle
    #[error("Vertical coordinate '{0}' is not supported for region extraction")]
    UnsupportedCoordinate(String),

    /// Moving-average window that cannot be parsed
    #[error("Moving average window not recognised: {0}")]
    InvalidWindow(String),

    /// Time units or calendar that cannot be decoded
    #[error("Invalid time units: {0}")]
    InvalidTimeUnits(String),

    /// Variable layout the field model cannot represent
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Two arrays that must share a shape do not
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Variable not found in NetCDF file
    #[error("Variable '{var}' not found in file")]
    VariableNotFound { var: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    StatisticsError(String),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Result type alias for climdiag operations
pub type Result<T> = std::result::Result<T, DiagError>;
