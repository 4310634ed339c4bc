use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid coordinate format: {0}")]
    InvalidCoordinate(String),

    #[error("Duplicate date {date} in series '{source_name}'")]
    DuplicateDate {
        source_name: String,
        date: NaiveDate,
    },

    #[error("Invalid timestamp '{value}' on line {line}: {reason}")]
    InvalidTimestamp {
        line: usize,
        value: String,
        reason: String,
    },

    #[error("Column '{column}' not found in {}", .file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("Unsupported temporal resolution '{0}' (only 'daily' is supported)")]
    UnsupportedResolution(String),

    #[error("No grid cell in source '{source_name}' covers site {site_id}")]
    NoGridCell {
        source_name: String,
        site_id: String,
    },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}
