use crate::error::{ProcessingError, Result};
use crate::models::{ForcingRecord, Variable};
use crate::utils::constants::{DATE_COLUMN, DEFAULT_OUTPUT_MISSING, DOY_COLUMN, FILL_FLAGS_COLUMN};
use crate::utils::text::is_missing_marker;
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Flat-file sink: `date,doy,<forcing variables>[,fill_flags]`.
pub struct CsvWriter {
    missing_marker: String,
    fill_flags: bool,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self {
            missing_marker: DEFAULT_OUTPUT_MISSING.to_string(),
            fill_flags: false,
        }
    }

    pub fn with_missing_marker(mut self, marker: &str) -> Self {
        self.missing_marker = marker.to_string();
        self
    }

    pub fn with_fill_flags(mut self, fill_flags: bool) -> Self {
        self.fill_flags = fill_flags;
        self
    }

    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec![DATE_COLUMN, DOY_COLUMN];
        header.extend(Variable::FORCING.iter().map(|v| v.column_name()));
        if self.fill_flags {
            header.push(FILL_FLAGS_COLUMN);
        }
        header
    }

    pub fn write(&self, records: &[ForcingRecord], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;

        for record in records {
            let mut row = vec![
                record.date.format(DATE_FORMAT).to_string(),
                record.doy.to_string(),
            ];
            for variable in Variable::FORCING {
                row.push(match record.get(variable) {
                    Some(value) => value.to_string(),
                    None => self.missing_marker.clone(),
                });
            }
            if self.fill_flags {
                row.push(record.fill_flags.clone());
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    /// Read a file written by `write`. Missing markers and anything that
    /// does not parse as a number are read as missing.
    pub fn read_records(&self, path: &Path) -> Result<Vec<ForcingRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            position(name).ok_or_else(|| ProcessingError::MissingColumn {
                file: path.to_path_buf(),
                column: name.to_string(),
            })
        };

        let date_col = require(DATE_COLUMN)?;
        let mut value_cols = [0usize; 6];
        for (slot, variable) in value_cols.iter_mut().zip(Variable::FORCING) {
            *slot = require(variable.column_name())?;
        }
        let flags_col = position(FILL_FLAGS_COLUMN);
        let markers = std::slice::from_ref(&self.missing_marker);

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let date = NaiveDate::parse_from_str(row.get(date_col).unwrap_or(""), DATE_FORMAT)?;
            let values = value_cols.map(|col| {
                row.get(col)
                    .filter(|raw| !is_missing_marker(raw, markers))
                    .and_then(|raw| raw.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
            });
            let flags = flags_col.and_then(|col| row.get(col));
            records.push(ForcingRecord::from_columns(date, values, flags));
        }

        Ok(records)
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}
