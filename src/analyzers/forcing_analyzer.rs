use crate::config::OutputFormat;
use crate::error::{ProcessingError, Result};
use crate::models::{ForcingRecord, Variable};
use crate::writers::{CsvWriter, ParquetWriter};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug)]
pub struct ForcingStatistics {
    pub total_records: usize,
    pub date_range: (NaiveDate, NaiveDate),
    pub complete_records: usize,
    pub filled_records: usize,
    pub gap_records: usize,
    /// Rows whose values or day-of-year fail record validation
    pub invalid_records: usize,
    pub variables: BTreeMap<Variable, VariableStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableStats {
    pub count: usize,
    pub coverage: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl VariableStats {
    fn from_values(values: &[f64], total: usize) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                coverage: 0.0,
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
            };
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self {
            count: values.len(),
            coverage: 100.0 * values.len() as f64 / total as f64,
            min,
            max,
            mean,
        }
    }
}

/// Summarises a written forcing file.
pub struct ForcingAnalyzer;

impl ForcingAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Read a CSV or Parquet forcing file, chosen by extension. `limit`
    /// caps the number of rows read.
    pub fn read_records(&self, path: &Path, limit: Option<usize>) -> Result<Vec<ForcingRecord>> {
        match OutputFormat::from_path(path) {
            OutputFormat::Parquet => ParquetWriter::new().read_records(path, limit),
            OutputFormat::Csv => {
                let mut records = CsvWriter::new().read_records(path)?;
                if let Some(limit) = limit {
                    records.truncate(limit);
                }
                Ok(records)
            }
        }
    }

    pub fn analyze_file(&self, path: &Path) -> Result<ForcingStatistics> {
        let records = self.read_records(path, None)?;
        self.calculate_statistics(&records)
    }

    pub fn calculate_statistics(&self, records: &[ForcingRecord]) -> Result<ForcingStatistics> {
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ProcessingError::MissingData(
                    "No records to analyze".to_string(),
                ))
            }
        };

        let mut variables = BTreeMap::new();
        for variable in Variable::FORCING {
            let values: Vec<f64> = records.iter().filter_map(|r| r.get(variable)).collect();
            variables.insert(variable, VariableStats::from_values(&values, records.len()));
        }

        Ok(ForcingStatistics {
            total_records: records.len(),
            date_range: (first.date, last.date),
            complete_records: records.iter().filter(|r| r.is_complete()).count(),
            filled_records: records.iter().filter(|r| r.has_climatology_fill()).count(),
            gap_records: records.iter().filter(|r| r.has_missing_data()).count(),
            invalid_records: records
                .iter()
                .filter(|r| r.validate_record().is_err())
                .count(),
            variables,
        })
    }
}

impl Default for ForcingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ForcingStatistics {
    pub fn summary(&self) -> String {
        format!(
            "Date Range: {} to {} ({} days)\n\
            Records: {} total, {} complete ({:.1}%)\n\
            Records with climatology fill: {}\n\
            Records with unfilled gaps: {}\n\
            Records failing validation: {}",
            self.date_range.0,
            self.date_range.1,
            self.date_range
                .1
                .signed_duration_since(self.date_range.0)
                .num_days()
                + 1,
            self.total_records,
            self.complete_records,
            100.0 * self.complete_records as f64 / self.total_records as f64,
            self.filled_records,
            self.gap_records,
            self.invalid_records
        )
    }

    pub fn detailed_summary(&self) -> String {
        let mut text = self.summary();
        text.push_str("\n\nVariable        Coverage      Min      Max     Mean  Units\n");
        for (variable, stats) in &self.variables {
            if stats.count == 0 {
                text.push_str(&format!(
                    "{:<14} {:>8.1}%  no valid values\n",
                    variable.column_name(),
                    stats.coverage
                ));
                continue;
            }
            text.push_str(&format!(
                "{:<14} {:>8.1}% {:>8.2} {:>8.2} {:>8.2}  {}\n",
                variable.column_name(),
                stats.coverage,
                stats.min,
                stats.max,
                stats.mean,
                variable.units()
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use tempfile::TempDir;

    fn records() -> Vec<ForcingRecord> {
        (1..=4)
            .map(|day| {
                let mut record = ForcingRecord::new(NaiveDate::from_ymd_opt(2020, 5, day).unwrap());
                record.set(Variable::Temperature, Some(day as f64 * 2.0), Provenance::Observed);
                if day > 2 {
                    record.set(Variable::Precipitation, Some(1.0), Provenance::Climatology);
                }
                record
            })
            .collect()
    }

    #[test]
    fn test_statistics() -> Result<()> {
        let stats = ForcingAnalyzer::new().calculate_statistics(&records())?;
        let temperature = stats.variables[&Variable::Temperature];

        assert_eq!(stats.total_records, 4);
        assert_eq!(temperature.count, 4);
        assert_eq!(temperature.min, 2.0);
        assert_eq!(temperature.max, 8.0);
        assert_eq!(temperature.mean, 5.0);
        assert_eq!(stats.variables[&Variable::Precipitation].coverage, 50.0);
        assert_eq!(stats.variables[&Variable::Co2].count, 0);
        assert_eq!(stats.filled_records, 2);
        // Vpd, radiation, cloud cover and CO2 are never set
        assert_eq!(stats.gap_records, 4);
        assert_eq!(stats.invalid_records, 0);
        assert!(stats.detailed_summary().contains("no valid values"));
        Ok(())
    }

    #[test]
    fn test_analyze_csv_and_parquet() -> Result<()> {
        let dir = TempDir::new()?;
        let csv_path = dir.path().join("forcing.csv");
        let parquet_path = dir.path().join("forcing.parquet");
        CsvWriter::new().write(&records(), &csv_path)?;
        ParquetWriter::new().write(&records(), &parquet_path)?;

        let analyzer = ForcingAnalyzer::new();
        let from_csv = analyzer.analyze_file(&csv_path)?;
        let from_parquet = analyzer.analyze_file(&parquet_path)?;

        assert_eq!(from_csv.total_records, from_parquet.total_records);
        for variable in [Variable::Temperature, Variable::Precipitation] {
            assert_eq!(from_csv.variables[&variable], from_parquet.variables[&variable]);
        }
        assert_eq!(analyzer.read_records(&csv_path, Some(1))?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_counts_implausible_rows() -> Result<()> {
        let mut rows = records();
        rows[1].set(Variable::Precipitation, Some(-5.0), Provenance::Observed);

        let stats = ForcingAnalyzer::new().calculate_statistics(&rows)?;
        assert_eq!(stats.invalid_records, 1);
        assert!(stats.summary().contains("Records failing validation: 1"));
        Ok(())
    }

    #[test]
    fn test_empty_input() {
        assert!(ForcingAnalyzer::new().calculate_statistics(&[]).is_err());
    }
}
