use crate::models::{DailySeries, SubdailySeries, Variable};
use crate::processors::aggregator::{Aggregator, Statistic};
use crate::utils::constants::{
    EPSILON, LAPSE_RATE, PRESSURE_EXPONENT, SEA_LEVEL_PRESSURE_KPA, STANDARD_TEMP_K, TETENS_A,
    TETENS_B, TETENS_C,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// How the humidity input is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumidityKind {
    /// Percent, 0-100
    #[default]
    Relative,
    /// kg/kg
    Specific,
}

impl HumidityKind {
    pub fn variable(&self) -> Variable {
        match self {
            HumidityKind::Relative => Variable::RelativeHumidity,
            HumidityKind::Specific => Variable::SpecificHumidity,
        }
    }
}

/// Saturation vapour pressure in kPa (Tetens).
pub fn saturation_vapor_pressure(temp_c: f64) -> f64 {
    TETENS_A * (TETENS_B * temp_c / (temp_c + TETENS_C)).exp()
}

/// Station pressure in kPa estimated from elevation (FAO-56 eq. 7).
pub fn station_pressure(elevation_m: f64) -> f64 {
    SEA_LEVEL_PRESSURE_KPA
        * ((STANDARD_TEMP_K - LAPSE_RATE * elevation_m) / STANDARD_TEMP_K).powf(PRESSURE_EXPONENT)
}

/// Actual vapour pressure in kPa from specific humidity.
pub fn vapor_pressure_from_specific(specific_humidity: f64, pressure_kpa: f64) -> f64 {
    specific_humidity * pressure_kpa / (EPSILON + (1.0 - EPSILON) * specific_humidity)
}

pub struct VpdCalculator {
    humidity: HumidityKind,
    elevation: f64,
}

impl VpdCalculator {
    pub fn new(humidity: HumidityKind, elevation: f64) -> Self {
        Self {
            humidity,
            elevation,
        }
    }

    /// VPD in kPa for a single reading; any missing input gives a missing result.
    pub fn vpd(&self, humidity: Option<f64>, temp_c: Option<f64>) -> Option<f64> {
        let (humidity, temp_c) = (humidity?, temp_c?);
        if !humidity.is_finite() || !temp_c.is_finite() {
            return None;
        }

        let es = saturation_vapor_pressure(temp_c);
        let deficit = match self.humidity {
            HumidityKind::Relative => es * (1.0 - humidity / 100.0),
            HumidityKind::Specific => {
                let ea = vapor_pressure_from_specific(humidity, station_pressure(self.elevation));
                es - ea
            }
        };

        Some(deficit.max(0.0))
    }

    /// Add a VPD value to every sub-daily reading.
    ///
    /// Humidity is assumed constant through the day: each reading uses the
    /// daily humidity for its date. When `daily_humidity` is `None` the daily
    /// value is the full-day mean of the sub-daily humidity itself.
    pub fn subdaily_vpd(
        &self,
        series: &SubdailySeries,
        daily_humidity: Option<&DailySeries>,
    ) -> SubdailySeries {
        let humidity_var = self.humidity.variable();

        let from_readings;
        let daily = match daily_humidity {
            Some(daily) => daily,
            None => {
                from_readings = Aggregator::new().full_day(series, humidity_var, Statistic::Mean);
                &from_readings
            }
        };

        let mut lookup = HashMap::new();
        for date in daily.dates() {
            lookup.insert(date, daily.get(date, humidity_var));
        }

        let mut result = series.clone();
        let mut computed = 0usize;
        for record in result.records_mut() {
            let humidity = lookup.get(&record.date()).copied().flatten();
            let vpd = self.vpd(humidity, record.get(Variable::Temperature));
            if vpd.is_some() {
                computed += 1;
            }
            record.values.insert(Variable::Vpd, vpd);
        }

        debug!(
            "Derived VPD for {} of {} sub-daily readings",
            computed,
            result.len()
        );
        result
    }

    /// Add VPD to a daily series from its own humidity and temperature.
    pub fn daily_vpd(&self, series: &DailySeries) -> DailySeries {
        let humidity_var = self.humidity.variable();
        let mut result = series.clone();
        let dates: Vec<_> = series.dates().collect();
        for date in dates {
            let vpd = self.vpd(
                series.get(date, humidity_var),
                series.get(date, Variable::Temperature),
            );
            if series.get(date, Variable::Vpd).is_none() {
                result.set(date, Variable::Vpd, vpd);
            }
        }
        result
    }
}
