use crate::error::{ProcessingError, Result};
use crate::models::{ForcingRecord, Variable};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DATE_COLUMN, DEFAULT_ROW_GROUP_SIZE, DOY_COLUMN, FILL_FLAGS_COLUMN,
};
use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, StringArray, UInt16Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn parse_compression(name: &str) -> Result<Compression> {
    match name.to_lowercase().as_str() {
        COMPRESSION_SNAPPY => Ok(Compression::SNAPPY),
        COMPRESSION_GZIP => Ok(Compression::GZIP(GzipLevel::default())),
        COMPRESSION_LZ4 => Ok(Compression::LZ4),
        COMPRESSION_ZSTD => Ok(Compression::ZSTD(ZstdLevel::default())),
        COMPRESSION_NONE => Ok(Compression::UNCOMPRESSED),
        _ => Err(ProcessingError::Config(format!(
            "Unsupported compression: {}",
            name
        ))),
    }
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
    fill_flags: bool,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            fill_flags: false,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = parse_compression(compression)?;
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    pub fn with_fill_flags(mut self, fill_flags: bool) -> Self {
        self.fill_flags = fill_flags;
        self
    }

    /// Write forcing records, one row group per `row_group_size` rows.
    pub fn write(&self, records: &[ForcingRecord], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let schema = self.create_schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(self.row_group_size.max(1)) {
            let batch = self.records_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    fn create_schema(&self) -> Arc<Schema> {
        let mut fields = vec![
            Field::new(DATE_COLUMN, DataType::Date32, false),
            Field::new(DOY_COLUMN, DataType::UInt16, false),
        ];
        for variable in Variable::FORCING {
            fields.push(Field::new(variable.column_name(), DataType::Float64, true));
        }
        if self.fill_flags {
            fields.push(Field::new(FILL_FLAGS_COLUMN, DataType::Utf8, false));
        }
        Arc::new(Schema::new(fields))
    }

    fn records_to_batch(
        &self,
        records: &[ForcingRecord],
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let epoch = unix_epoch();
        let dates: Vec<i32> = records
            .iter()
            .map(|r| (r.date - epoch).num_days() as i32)
            .collect();
        let doys: Vec<u16> = records.iter().map(|r| r.doy as u16).collect();

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(dates)),
            Arc::new(UInt16Array::from(doys)),
        ];
        for variable in Variable::FORCING {
            let values: Vec<Option<f64>> = records.iter().map(|r| r.get(variable)).collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }
        if self.fill_flags {
            let flags: Vec<&str> = records.iter().map(|r| r.fill_flags.as_str()).collect();
            columns.push(Arc::new(StringArray::from(flags)));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    /// Read records back, up to `limit` rows when given.
    pub fn read_records(&self, path: &Path, limit: Option<usize>) -> Result<Vec<ForcingRecord>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let epoch = unix_epoch();
        let limit = limit.unwrap_or(usize::MAX);

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;

            let dates = column::<Date32Array>(&batch, DATE_COLUMN)?;
            let mut values = Vec::with_capacity(Variable::FORCING.len());
            for variable in Variable::FORCING {
                values.push(column::<Float64Array>(&batch, variable.column_name())?);
            }
            let flags = match batch.schema().index_of(FILL_FLAGS_COLUMN) {
                Ok(_) => Some(column::<StringArray>(&batch, FILL_FLAGS_COLUMN)?),
                Err(_) => None,
            };

            for i in 0..batch.num_rows() {
                if records.len() >= limit {
                    return Ok(records);
                }
                let date = epoch + chrono::Duration::days(dates.value(i) as i64);
                let row: Vec<Option<f64>> = values
                    .iter()
                    .map(|array| (!array.is_null(i)).then(|| array.value(i)))
                    .collect();
                let row: [Option<f64>; 6] = [row[0], row[1], row[2], row[3], row[4], row[5]];
                records.push(ForcingRecord::from_columns(
                    date,
                    row,
                    flags.as_ref().map(|f| f.value(i)),
                ));
            }
        }

        Ok(records)
    }

    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();
        let compression = metadata
            .row_groups()
            .first()
            .and_then(|rg| rg.columns().first())
            .map(|c| c.compression())
            .unwrap_or(Compression::UNCOMPRESSED);

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
            compression,
        })
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let index = batch
        .schema()
        .index_of(name)
        .map_err(|_| ProcessingError::InvalidFormat(format!("Missing column '{}'", name)))?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid {} column type", name)))
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        let per_group = if self.row_groups > 0 {
            self.total_rows as f64 / self.row_groups as f64
        } else {
            0.0
        };
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} KB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression,
            per_group
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_records() -> Vec<ForcingRecord> {
        (1..=10)
            .map(|day| {
                let mut record =
                    ForcingRecord::new(NaiveDate::from_ymd_opt(2021, 1, day).unwrap());
                record.set(Variable::Temperature, Some(day as f64), Provenance::Observed);
                record.set(Variable::Co2, Some(415.0), Provenance::Gridded);
                if day % 2 == 0 {
                    record.set(Variable::Precipitation, Some(1.5), Provenance::Climatology);
                }
                record
            })
            .collect()
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("forcing.parquet");
        let records = sample_records();

        let writer = ParquetWriter::new().with_fill_flags(true);
        writer.write(&records, &path)?;
        let read = writer.read_records(&path, None)?;

        assert_eq!(read, records);
        Ok(())
    }

    #[test]
    fn test_read_with_limit_and_without_flags() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("forcing.parquet");

        let writer = ParquetWriter::new();
        writer.write(&sample_records(), &path)?;
        let read = writer.read_records(&path, Some(3))?;

        assert_eq!(read.len(), 3);
        assert_eq!(read[0].precipitation, None);
        assert_eq!(read[1].precipitation, Some(1.5));
        assert_eq!(read[1].fill_flags, "OMOMMO");
        Ok(())
    }

    #[test]
    fn test_file_info_row_groups() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("forcing.parquet");

        let writer = ParquetWriter::new()
            .with_compression("zstd")?
            .with_row_group_size(4);
        writer.write(&sample_records(), &path)?;
        let info = writer.get_file_info(&path)?;

        assert_eq!(info.total_rows, 10);
        assert_eq!(info.row_groups, 3);
        assert_eq!(info.row_group_sizes, vec![4, 4, 2]);
        assert!(info.summary().contains("Total rows: 10"));
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        let dir = TempDir::new()?;
        for compression in ["snappy", "gzip", "lz4", "zstd", "none"] {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let path = dir.path().join(format!("{}.parquet", compression));
            writer.write(&sample_records(), &path)?;
            assert_eq!(writer.read_records(&path, None)?.len(), 10);
        }

        assert!(ParquetWriter::new().with_compression("brotli-ish").is_err());
        Ok(())
    }

    #[test]
    fn test_write_empty_records() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.parquet");

        ParquetWriter::new().write(&[], &path)?;
        assert_eq!(ParquetWriter::new().get_file_info(&path)?.total_rows, 0);
        Ok(())
    }
}
