pub mod csv_writer;
pub mod parquet_writer;

pub use csv_writer::CsvWriter;
pub use parquet_writer::{parse_compression, ParquetFileInfo, ParquetWriter};

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::models::ForcingRecord;
use std::path::Path;

/// Write records in the configured format.
pub fn write_forcing(records: &[ForcingRecord], path: &Path, output: &OutputConfig) -> Result<()> {
    match output.format {
        OutputFormat::Csv => CsvWriter::new()
            .with_missing_marker(&output.missing_marker)
            .with_fill_flags(output.fill_flags)
            .write(records, path),
        OutputFormat::Parquet => ParquetWriter::new()
            .with_compression(&output.compression)?
            .with_fill_flags(output.fill_flags)
            .write(records, path),
    }
}
