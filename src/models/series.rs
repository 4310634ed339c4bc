use crate::error::{ProcessingError, Result};
use crate::models::Variable;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

/// Per-record variable values; `None` is an explicit missing marker.
pub type Values = BTreeMap<Variable, Option<f64>>;

/// Daily series keyed by calendar date, at most one record per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    name: String,
    records: BTreeMap<NaiveDate, Values>,
}

impl DailySeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
        }
    }

    /// Build a series from raw records, rejecting repeated dates.
    pub fn from_records(
        name: impl Into<String>,
        records: impl IntoIterator<Item = (NaiveDate, Values)>,
    ) -> Result<Self> {
        let mut series = Self::new(name);
        for (date, values) in records {
            if series.records.contains_key(&date) {
                return Err(ProcessingError::DuplicateDate {
                    source_name: series.name.clone(),
                    date,
                });
            }
            series.records.insert(date, values);
        }
        Ok(series)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: NaiveDate, variable: Variable) -> Option<f64> {
        self.records
            .get(&date)
            .and_then(|values| values.get(&variable).copied().flatten())
    }

    pub fn values(&self, date: NaiveDate) -> Option<&Values> {
        self.records.get(&date)
    }

    /// Set one value, creating the date's record if needed.
    pub fn set(&mut self, date: NaiveDate, variable: Variable, value: Option<f64>) {
        self.records.entry(date).or_default().insert(variable, value);
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Values)> {
        self.records.iter()
    }

    /// All variables that appear in at least one record.
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.records
            .values()
            .flat_map(|values| values.keys().copied())
            .collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.records.keys().next()?;
        let last = *self.records.keys().next_back()?;
        Some((first, last))
    }

    /// Keep only the dates whose year falls in `years`.
    pub fn restrict_years(&self, years: &RangeInclusive<i32>) -> DailySeries {
        DailySeries {
            name: self.name.clone(),
            records: self
                .records
                .iter()
                .filter(|(date, _)| years.contains(&date.year()))
                .map(|(date, values)| (*date, values.clone()))
                .collect(),
        }
    }

    /// Fill this series' missing values from `other`; existing values always win.
    pub fn overlay(&self, other: &DailySeries) -> DailySeries {
        let mut merged = self.clone();
        for (date, values) in &other.records {
            let entry = merged.records.entry(*date).or_default();
            for (variable, value) in values {
                let slot = entry.entry(*variable).or_insert(None);
                if slot.is_none() {
                    *slot = *value;
                }
            }
        }
        merged
    }

    /// Apply `f` to every non-missing value of one variable.
    pub fn map_variable(&mut self, variable: Variable, f: impl Fn(f64) -> f64) {
        for values in self.records.values_mut() {
            if let Some(Some(value)) = values.get_mut(&variable) {
                *value = f(*value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubdailyRecord {
    pub timestamp: NaiveDateTime,
    pub values: Values,
}

impl SubdailyRecord {
    pub fn new(timestamp: NaiveDateTime, values: Values) -> Self {
        Self { timestamp, values }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied().flatten()
    }
}

/// Sub-daily readings ordered by timestamp; many records share a date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubdailySeries {
    name: String,
    records: Vec<SubdailyRecord>,
}

impl SubdailySeries {
    pub fn new(name: impl Into<String>, mut records: Vec<SubdailyRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[SubdailyRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [SubdailyRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        self.records
            .iter()
            .flat_map(|r| r.values.keys().copied())
            .collect()
    }
}

/// Every calendar date from Jan 1 of the first year to Dec 31 of the last.
pub fn calendar_dates(years: &RangeInclusive<i32>) -> Vec<NaiveDate> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(*years.start(), 1, 1),
        NaiveDate::from_ymd_opt(*years.end(), 12, 31),
    ) else {
        return Vec::new();
    };
    start.iter_days().take_while(|d| *d <= end).collect()
}
