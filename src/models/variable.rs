use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variables carried through the forcing pipeline.
///
/// The first six are forcing outputs; the humidity variables are only
/// inputs to the VPD calculation and never reach the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Temperature,
    Vpd,
    Precipitation,
    Radiation,
    CloudCover,
    Co2,
    RelativeHumidity,
    SpecificHumidity,
}

impl Variable {
    /// Forcing variables in output column order.
    pub const FORCING: [Variable; 6] = [
        Variable::Temperature,
        Variable::Vpd,
        Variable::Precipitation,
        Variable::Radiation,
        Variable::CloudCover,
        Variable::Co2,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::Vpd => "vpd",
            Variable::Precipitation => "precipitation",
            Variable::Radiation => "radiation",
            Variable::CloudCover => "cloud_cover",
            Variable::Co2 => "co2",
            Variable::RelativeHumidity => "relative_humidity",
            Variable::SpecificHumidity => "specific_humidity",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Variable::Temperature => "Air temperature",
            Variable::Vpd => "Vapour-pressure deficit",
            Variable::Precipitation => "Precipitation",
            Variable::Radiation => "Radiation flux",
            Variable::CloudCover => "Cloud cover",
            Variable::Co2 => "CO2 concentration",
            Variable::RelativeHumidity => "Relative humidity",
            Variable::SpecificHumidity => "Specific humidity",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Temperature => "°C",
            Variable::Vpd => "kPa",
            Variable::Precipitation => "mm",
            Variable::Radiation => "W/m²",
            Variable::CloudCover => "%",
            Variable::Co2 => "ppm",
            Variable::RelativeHumidity => "%",
            Variable::SpecificHumidity => "kg/kg",
        }
    }

    /// Physically plausible range, used for QA reporting only.
    pub fn plausible_range(&self) -> (f64, f64) {
        match self {
            Variable::Temperature => (-90.0, 60.0),
            Variable::Vpd => (0.0, 10.0),
            Variable::Precipitation => (0.0, 2000.0),
            Variable::Radiation => (0.0, 1500.0),
            Variable::CloudCover => (0.0, 100.0),
            Variable::Co2 => (150.0, 1000.0),
            Variable::RelativeHumidity => (0.0, 100.0),
            Variable::SpecificHumidity => (0.0, 0.05),
        }
    }

    pub fn is_forcing(&self) -> bool {
        Self::FORCING.contains(self)
    }

    pub fn is_humidity(&self) -> bool {
        matches!(
            self,
            Variable::RelativeHumidity | Variable::SpecificHumidity
        )
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

impl FromStr for Variable {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "temperature" | "tair" | "tmp" => Ok(Variable::Temperature),
            "vpd" => Ok(Variable::Vpd),
            "precipitation" | "precip" | "pre" => Ok(Variable::Precipitation),
            "radiation" | "par" | "swdown" => Ok(Variable::Radiation),
            "cloud_cover" | "cld" => Ok(Variable::CloudCover),
            "co2" => Ok(Variable::Co2),
            "relative_humidity" | "rh" => Ok(Variable::RelativeHumidity),
            "specific_humidity" | "qair" => Ok(Variable::SpecificHumidity),
            other => Err(ProcessingError::InvalidFormat(format!(
                "Unknown variable: '{}'",
                other
            ))),
        }
    }
}

/// Where a merged value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    Observed,
    Gridded,
    Climatology,
    Missing,
}

impl Provenance {
    pub fn as_char(&self) -> char {
        match self {
            Provenance::Observed => 'O',
            Provenance::Gridded => 'G',
            Provenance::Climatology => 'C',
            Provenance::Missing => 'M',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'O' => Some(Provenance::Observed),
            'G' => Some(Provenance::Gridded),
            'C' => Some(Provenance::Climatology),
            'M' => Some(Provenance::Missing),
            _ => None,
        }
    }
}
