use crate::error::{ProcessingError, Result};
use crate::models::{Provenance, Variable};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One row of the assembled forcing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ForcingRecord {
    pub date: NaiveDate,

    #[validate(range(min = 1, max = 366))]
    pub doy: u32,

    #[validate(range(min = -90.0, max = 60.0))]
    pub temperature: Option<f64>,

    #[validate(range(min = 0.0))]
    pub vpd: Option<f64>,

    #[validate(range(min = 0.0))]
    pub precipitation: Option<f64>,

    #[validate(range(min = 0.0))]
    pub radiation: Option<f64>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub cloud_cover: Option<f64>,

    #[validate(range(min = 0.0))]
    pub co2: Option<f64>,

    /// One provenance character per forcing variable, in output column order.
    pub fill_flags: String,
}

impl ForcingRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            doy: date.ordinal(),
            temperature: None,
            vpd: None,
            precipitation: None,
            radiation: None,
            cloud_cover: None,
            co2: None,
            fill_flags: Variable::FORCING
                .iter()
                .map(|_| Provenance::Missing.as_char())
                .collect(),
        }
    }

    /// Rebuild a record from a written row. Without a flags column the
    /// provenance is unknown and present values are taken as observed.
    pub fn from_columns(
        date: NaiveDate,
        values: [Option<f64>; 6],
        fill_flags: Option<&str>,
    ) -> Self {
        let mut record = Self::new(date);
        for (variable, value) in Variable::FORCING.into_iter().zip(values) {
            let provenance = if value.is_some() {
                Provenance::Observed
            } else {
                Provenance::Missing
            };
            record.set(variable, value, provenance);
        }
        if let Some(flags) = fill_flags {
            record.fill_flags = flags.to_string();
        }
        record
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Temperature => self.temperature,
            Variable::Vpd => self.vpd,
            Variable::Precipitation => self.precipitation,
            Variable::Radiation => self.radiation,
            Variable::CloudCover => self.cloud_cover,
            Variable::Co2 => self.co2,
            Variable::RelativeHumidity | Variable::SpecificHumidity => None,
        }
    }

    /// Store a value and its provenance. Non-forcing variables are ignored.
    pub fn set(&mut self, variable: Variable, value: Option<f64>, provenance: Provenance) {
        let slot = match variable {
            Variable::Temperature => &mut self.temperature,
            Variable::Vpd => &mut self.vpd,
            Variable::Precipitation => &mut self.precipitation,
            Variable::Radiation => &mut self.radiation,
            Variable::CloudCover => &mut self.cloud_cover,
            Variable::Co2 => &mut self.co2,
            Variable::RelativeHumidity | Variable::SpecificHumidity => return,
        };
        *slot = value;

        if let Some(index) = Variable::FORCING.iter().position(|v| *v == variable) {
            let mut flags: Vec<char> = self.fill_flags.chars().collect();
            if let Some(flag) = flags.get_mut(index) {
                *flag = provenance.as_char();
            }
            self.fill_flags = flags.into_iter().collect();
        }
    }

    pub fn provenance(&self, variable: Variable) -> Provenance {
        Variable::FORCING
            .iter()
            .position(|v| *v == variable)
            .and_then(|index| self.fill_flags.chars().nth(index))
            .and_then(Provenance::from_char)
            .unwrap_or(Provenance::Missing)
    }

    pub fn is_complete(&self) -> bool {
        Variable::FORCING.iter().all(|v| self.get(*v).is_some())
    }

    pub fn has_climatology_fill(&self) -> bool {
        self.fill_flags.contains(Provenance::Climatology.as_char())
    }

    pub fn has_missing_data(&self) -> bool {
        self.fill_flags.contains(Provenance::Missing.as_char())
    }

    pub fn validate_record(&self) -> Result<()> {
        if self.doy != self.date.ordinal() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Day of year {} does not match date {}",
                self.doy, self.date
            )));
        }
        self.validate()?;
        Ok(())
    }
}
