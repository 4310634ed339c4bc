use crate::error::{ProcessingError, Result};
use crate::models::{DailySeries, SubdailyRecord, SubdailySeries, Values, Variable};
use crate::utils::text::{is_missing_marker, read_text_file};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Maps a file column onto a pipeline variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub variable: Variable,
}

impl ColumnMapping {
    pub fn new(column: &str, variable: Variable) -> Self {
        Self {
            column: column.to_string(),
            variable,
        }
    }
}

/// How a row's timestamp is spread over columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum TimestampLayout {
    YearMonthDay {
        #[serde(default = "default_year_column")]
        year: String,
        #[serde(default = "default_month_column")]
        month: String,
        #[serde(default = "default_day_column")]
        day: String,
    },
    Combined {
        column: String,
        #[serde(default = "default_datetime_format")]
        format: String,
    },
    DateAndTime {
        date: String,
        time: String,
        #[serde(default = "default_date_format")]
        date_format: String,
        #[serde(default = "default_time_format")]
        time_format: String,
    },
}

fn default_year_column() -> String {
    "year".to_string()
}

fn default_month_column() -> String {
    "month".to_string()
}

fn default_day_column() -> String {
    "day".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_time_format() -> String {
    "%H:%M".to_string()
}

impl Default for TimestampLayout {
    fn default() -> Self {
        TimestampLayout::YearMonthDay {
            year: default_year_column(),
            month: default_month_column(),
            day: default_day_column(),
        }
    }
}

/// A site-measured observation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationFile {
    pub path: PathBuf,
    #[serde(default)]
    pub timestamp: TimestampLayout,
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub missing_markers: Vec<String>,
}

impl ObservationFile {
    pub fn new(path: PathBuf, timestamp: TimestampLayout, columns: Vec<ColumnMapping>) -> Self {
        Self {
            path,
            timestamp,
            columns,
            delimiter: None,
            missing_markers: Vec::new(),
        }
    }

    fn series_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "observations".to_string())
    }
}

enum TimestampColumns {
    YearMonthDay(usize, usize, usize),
    Combined(usize),
    DateAndTime(usize, usize),
}

pub struct ObservationReader;

impl ObservationReader {
    pub fn new() -> Self {
        Self
    }

    /// Read a daily table. Repeated dates fail the read.
    pub fn read_daily(&self, file: &ObservationFile) -> Result<DailySeries> {
        let rows = self.read_rows(file)?;
        let series = DailySeries::from_records(
            file.series_name(),
            rows.into_iter().map(|(ts, values)| (ts.date(), values)),
        )?;

        info!(
            "Loaded {} daily observation records from {}",
            series.len(),
            file.path.display()
        );
        Ok(series)
    }

    pub fn read_subdaily(&self, file: &ObservationFile) -> Result<SubdailySeries> {
        let rows = self.read_rows(file)?;
        let records = rows
            .into_iter()
            .map(|(ts, values)| SubdailyRecord::new(ts, values))
            .collect();
        let series = SubdailySeries::new(file.series_name(), records);

        info!(
            "Loaded {} sub-daily observation records from {}",
            series.len(),
            file.path.display()
        );
        Ok(series)
    }

    fn read_rows(&self, file: &ObservationFile) -> Result<Vec<(NaiveDateTime, Values)>> {
        let text = read_text_file(&file.path)?;
        let delimiter = match file.delimiter {
            Some(c) if c.is_ascii() => c as u8,
            Some(c) => {
                return Err(ProcessingError::Config(format!(
                    "Delimiter '{}' is not a single-byte character",
                    c
                )))
            }
            None => b',',
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let find = |column: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| ProcessingError::MissingColumn {
                    file: file.path.clone(),
                    column: column.to_string(),
                })
        };

        let timestamp_columns = match &file.timestamp {
            TimestampLayout::YearMonthDay { year, month, day } => {
                TimestampColumns::YearMonthDay(
                    find(year.as_str())?,
                    find(month.as_str())?,
                    find(day.as_str())?,
                )
            }
            TimestampLayout::Combined { column, .. } => {
                TimestampColumns::Combined(find(column.as_str())?)
            }
            TimestampLayout::DateAndTime { date, time, .. } => {
                TimestampColumns::DateAndTime(find(date.as_str())?, find(time.as_str())?)
            }
        };

        let value_columns = file
            .columns
            .iter()
            .map(|mapping| Ok((find(mapping.column.as_str())?, mapping)))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1
            let line = index + 2;

            let timestamp =
                self.parse_timestamp(&record, &timestamp_columns, &file.timestamp, line)?;

            let mut values = Values::new();
            for (col, mapping) in &value_columns {
                let raw = record.get(*col).unwrap_or("");
                let value = self.parse_value(raw, &file.missing_markers, &mapping.column, line)?;
                values.insert(mapping.variable, value);
            }
            rows.push((timestamp, values));
        }

        debug!("Parsed {} rows from {}", rows.len(), file.path.display());
        Ok(rows)
    }

    fn parse_timestamp(
        &self,
        record: &csv::StringRecord,
        columns: &TimestampColumns,
        layout: &TimestampLayout,
        line: usize,
    ) -> Result<NaiveDateTime> {
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let invalid = |value: String, reason: String| ProcessingError::InvalidTimestamp {
            line,
            value,
            reason,
        };

        match (columns, layout) {
            (TimestampColumns::YearMonthDay(y, m, d), _) => {
                let raw = format!("{}-{}-{}", field(*y), field(*m), field(*d));
                let year = calendar_field(field(*y)).and_then(|v| i32::try_from(v).ok());
                let month = calendar_field(field(*m)).and_then(|v| u32::try_from(v).ok());
                let day = calendar_field(field(*d)).and_then(|v| u32::try_from(v).ok());
                let date = match (year, month, day) {
                    (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
                    _ => None,
                };
                date.and_then(|d| d.and_hms_opt(0, 0, 0))
                    .ok_or_else(|| invalid(raw, "not a calendar date".to_string()))
            }
            (TimestampColumns::Combined(c), TimestampLayout::Combined { format, .. }) => {
                let raw = field(*c);
                NaiveDateTime::parse_from_str(raw, format)
                    .or_else(|e| {
                        NaiveDate::parse_from_str(raw, format)
                            .map(|d| d.and_time(NaiveTime::default()))
                            .map_err(|_| e)
                    })
                    .map_err(|e| invalid(raw.to_string(), e.to_string()))
            }
            (
                TimestampColumns::DateAndTime(d, t),
                TimestampLayout::DateAndTime {
                    date_format,
                    time_format,
                    ..
                },
            ) => {
                let raw = format!("{} {}", field(*d), field(*t));
                let date = NaiveDate::parse_from_str(field(*d), date_format)
                    .map_err(|e| invalid(raw.clone(), e.to_string()))?;
                let time = NaiveTime::parse_from_str(field(*t), time_format)
                    .map_err(|e| invalid(raw.clone(), e.to_string()))?;
                Ok(date.and_time(time))
            }
            _ => Err(ProcessingError::Config(
                "Timestamp columns do not match layout".to_string(),
            )),
        }
    }

    fn parse_value(
        &self,
        raw: &str,
        extra_markers: &[String],
        column: &str,
        line: usize,
    ) -> Result<Option<f64>> {
        if is_missing_marker(raw, extra_markers) {
            return Ok(None);
        }
        let value = raw.trim().parse::<f64>().map_err(|_| {
            ProcessingError::InvalidFormat(format!(
                "Invalid value '{}' in column '{}' on line {}",
                raw, column, line
            ))
        })?;
        Ok(value.is_finite().then_some(value))
    }
}

/// Integer calendar field; spreadsheet exports like `2020.0` are accepted,
/// any fractional part is not.
fn calendar_field(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn read_daily_file(
        path: &Path,
        timestamp: TimestampLayout,
        columns: Vec<ColumnMapping>,
    ) -> Result<DailySeries> {
        ObservationReader::new().read_daily(&ObservationFile::new(
            path.to_path_buf(),
            timestamp,
            columns,
        ))
    }

    #[test]
    fn test_read_daily_year_month_day() -> Result<()> {
        let file = write_file(
            "year,month,day,Tair,Precip\n\
             2020,1,1,-2.5,0.0\n\
             2020,1,2,NA,1.2\n\
             2020,1,3,-1.0,\n",
        );

        let series = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![
                ColumnMapping::new("Tair", Variable::Temperature),
                ColumnMapping::new("Precip", Variable::Precipitation),
            ],
        )?;

        let jan = |d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(jan(1), Variable::Temperature), Some(-2.5));
        assert_eq!(series.get(jan(2), Variable::Temperature), None);
        assert_eq!(series.get(jan(2), Variable::Precipitation), Some(1.2));
        assert_eq!(series.get(jan(3), Variable::Precipitation), None);
        Ok(())
    }

    #[test]
    fn test_duplicate_daily_dates_fail() {
        let file = write_file("year,month,day,Tair\n2020,1,1,1.0\n2020,1,1,2.0\n");

        let result = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("Tair", Variable::Temperature)],
        );
        assert!(matches!(result, Err(ProcessingError::DuplicateDate { .. })));
    }

    #[test]
    fn test_read_subdaily_combined_timestamp() -> Result<()> {
        let file = write_file(
            "TIMESTAMP;AirTC;RH\n\
             2021-07-01 12:00:00;24.5;55\n\
             2021-07-01 06:00:00;15.0;80\n\
             2021-07-02 12:30:00;-9999;60\n",
        );

        let mut obs = ObservationFile::new(
            file.path().to_path_buf(),
            TimestampLayout::Combined {
                column: "TIMESTAMP".to_string(),
                format: default_datetime_format(),
            },
            vec![
                ColumnMapping::new("AirTC", Variable::Temperature),
                ColumnMapping::new("RH", Variable::RelativeHumidity),
            ],
        );
        obs.delimiter = Some(';');

        let series = ObservationReader::new().read_subdaily(&obs)?;
        assert_eq!(series.len(), 3);
        // Sorted by timestamp
        assert_eq!(series.records()[0].get(Variable::Temperature), Some(15.0));
        assert_eq!(series.records()[2].get(Variable::Temperature), None);
        assert_eq!(series.records()[2].get(Variable::RelativeHumidity), Some(60.0));
        Ok(())
    }

    #[test]
    fn test_read_subdaily_date_and_time() -> Result<()> {
        let file = write_file("Date,Time,Temp\n01/07/2021,1330,21.0\n");

        let obs = ObservationFile::new(
            file.path().to_path_buf(),
            TimestampLayout::DateAndTime {
                date: "Date".to_string(),
                time: "Time".to_string(),
                date_format: "%d/%m/%Y".to_string(),
                time_format: "%H%M".to_string(),
            },
            vec![ColumnMapping::new("Temp", Variable::Temperature)],
        );

        let series = ObservationReader::new().read_subdaily(&obs)?;
        let expected = NaiveDate::from_ymd_opt(2021, 7, 1)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        assert_eq!(series.records()[0].timestamp, expected);
        Ok(())
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let file = write_file("year,month,day,Tair\n2020,2,30,1.0\n");

        let result = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("Tair", Variable::Temperature)],
        );
        match result {
            Err(ProcessingError::InvalidTimestamp { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_fractional_calendar_fields_fail() {
        let file = write_file("year,month,day,Tair\n2020.9,1.5,3.7,1.0\n");

        let result = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("Tair", Variable::Temperature)],
        );
        assert!(matches!(
            result,
            Err(ProcessingError::InvalidTimestamp { line: 2, .. })
        ));
    }

    #[test]
    fn test_whole_number_calendar_fields_accepted() -> Result<()> {
        let file = write_file("year,month,day,Tair\n2020.0,3.0,1,4.5\n");

        let series = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("Tair", Variable::Temperature)],
        )?;
        let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(series.get(date, Variable::Temperature), Some(4.5));
        Ok(())
    }

    #[test]
    fn test_missing_column_fails() {
        let file = write_file("year,month,day,Tair\n2020,1,1,1.0\n");

        let result = read_daily_file(
            file.path(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("VPD", Variable::Vpd)],
        );
        assert!(matches!(result, Err(ProcessingError::MissingColumn { .. })));
    }

    #[test]
    fn test_extra_missing_marker() -> Result<()> {
        let file = write_file("year,month,day,Tair\n2020,1,1,-999\n");

        let mut obs = ObservationFile::new(
            file.path().to_path_buf(),
            TimestampLayout::default(),
            vec![ColumnMapping::new("Tair", Variable::Temperature)],
        );
        obs.missing_markers = vec!["-999".to_string()];

        let series = ObservationReader::new().read_daily(&obs)?;
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(series.get(date, Variable::Temperature), None);
        Ok(())
    }
}
