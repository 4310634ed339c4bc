use crate::error::{ProcessingError, Result};
use crate::models::{calendar_dates, DailySeries, Variable};
use crate::utils::text::read_text_file;
use chrono::Datelike;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Co2Record {
    pub year: i32,
    pub month: Option<u32>,
    pub ppm: Option<f64>,
}

/// Reads annual or monthly mean CO2 tables such as the NOAA global means.
///
/// Lines starting with `#` are comments. Fields are separated by commas or
/// whitespace. Rows are `year, mean, ...` for annual files or
/// `year, month, mean, ...` when the second field is an integer month.
/// Negative means are gaps.
pub struct Co2Reader;

impl Co2Reader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<Vec<Co2Record>> {
        let text = read_text_file(path)?;
        let mut records = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();

            // Header rows such as "year,mean"
            if fields.first().map_or(true, |f| f.parse::<i32>().is_err()) {
                continue;
            }

            records.push(parse_fields(&fields, index + 1, path)?);
        }

        info!("Read {} CO2 records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Expand to one value per calendar day: the monthly mean when present,
    /// otherwise the annual mean.
    pub fn to_daily(&self, records: &[Co2Record], years: &RangeInclusive<i32>) -> DailySeries {
        let mut annual: BTreeMap<i32, f64> = BTreeMap::new();
        let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();

        for record in records {
            let Some(ppm) = record.ppm else {
                continue;
            };
            match record.month {
                Some(month) => {
                    monthly.insert((record.year, month), ppm);
                }
                None => {
                    annual.insert(record.year, ppm);
                }
            }
        }

        let mut series = DailySeries::new("co2");
        let mut unresolved = 0;
        for date in calendar_dates(years) {
            let value = monthly
                .get(&(date.year(), date.month()))
                .or_else(|| annual.get(&date.year()))
                .copied();
            if value.is_none() {
                unresolved += 1;
            }
            series.set(date, Variable::Co2, value);
        }

        if unresolved > 0 {
            warn!("No CO2 value for {} days in {:?}", unresolved, years);
        }
        series
    }

    pub fn read_daily(&self, path: &Path, years: &RangeInclusive<i32>) -> Result<DailySeries> {
        let records = self.read(path)?;
        Ok(self.to_daily(&records, years))
    }
}

impl Default for Co2Reader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_fields(fields: &[&str], line: usize, path: &Path) -> Result<Co2Record> {
    let invalid = |what: &str| {
        ProcessingError::InvalidFormat(format!(
            "Invalid {} on line {} of {}",
            what,
            line,
            path.display()
        ))
    };

    let year: i32 = fields[0].parse().map_err(|_| invalid("year"))?;
    if fields.len() < 2 {
        return Err(invalid("record"));
    }

    let (month, raw_mean) = match fields[1].parse::<u32>() {
        Ok(month) => {
            if !(1..=12).contains(&month) {
                return Err(invalid("month"));
            }
            let raw_mean = fields.get(2).ok_or_else(|| invalid("record"))?;
            (Some(month), *raw_mean)
        }
        Err(_) => (None, fields[1]),
    };

    let mean: f64 = raw_mean.parse().map_err(|_| invalid("CO2 mean"))?;
    Ok(Co2Record {
        year,
        month,
        ppm: Some(mean).filter(|v| *v >= 0.0),
    })
}
