use crate::error::{ProcessingError, Result};
use crate::models::{DailySeries, SubdailySeries, Variable};
use crate::utils::constants::{DEFAULT_WINDOW_END_HOUR, DEFAULT_WINDOW_START_HOUR};
use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusive range of hours of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl Default for HourWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_WINDOW_START_HOUR,
            end: DEFAULT_WINDOW_END_HOUR,
        }
    }
}

impl HourWindow {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        let window = Self { start, end };
        window.check()?;
        Ok(window)
    }

    pub fn check(&self) -> Result<()> {
        if self.start > 23 || self.end > 23 || self.start > self.end {
            return Err(ProcessingError::Config(format!(
                "Invalid hour window {}..={} (hours must satisfy 0 <= start <= end <= 23)",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    #[default]
    Mean,
    Sum,
}

/// How one variable is reduced from sub-daily to daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationRule {
    #[serde(default)]
    pub statistic: Statistic,
    /// Restrict to the configured hour window
    #[serde(default)]
    pub window: bool,
}

impl AggregationRule {
    pub fn full_day(statistic: Statistic) -> Self {
        Self {
            statistic,
            window: false,
        }
    }

    pub fn window_mean() -> Self {
        Self {
            statistic: Statistic::Mean,
            window: true,
        }
    }
}

/// Per-variable aggregation rules.
///
/// Temperature and VPD default to the daytime window mean (daytime
/// physiological drivers); all other variables to the full-day mean.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPlan {
    rules: BTreeMap<Variable, AggregationRule>,
}

impl Default for AggregationPlan {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(Variable::Temperature, AggregationRule::window_mean());
        rules.insert(Variable::Vpd, AggregationRule::window_mean());
        Self { rules }
    }
}

impl AggregationPlan {
    pub fn with_overrides(mut self, overrides: &BTreeMap<Variable, AggregationRule>) -> Self {
        for (variable, rule) in overrides {
            self.rules.insert(*variable, *rule);
        }
        self
    }

    pub fn rule_for(&self, variable: Variable) -> AggregationRule {
        self.rules
            .get(&variable)
            .copied()
            .unwrap_or_else(|| AggregationRule::full_day(Statistic::Mean))
    }
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn finish(&self, statistic: Statistic) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match statistic {
            Statistic::Mean => Some(self.sum / self.count as f64),
            Statistic::Sum => Some(self.sum),
        }
    }
}

pub struct Aggregator {
    window: HourWindow,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            window: HourWindow::default(),
        }
    }

    pub fn with_hour_window(mut self, window: HourWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> HourWindow {
        self.window
    }

    /// Full-day statistic of one variable. Dates with no non-missing reading are missing.
    pub fn full_day(
        &self,
        series: &SubdailySeries,
        variable: Variable,
        statistic: Statistic,
    ) -> DailySeries {
        self.reduce(series, variable, statistic, None)
    }

    /// Mean of readings whose hour falls in the configured window.
    pub fn window_mean(&self, series: &SubdailySeries, variable: Variable) -> DailySeries {
        self.reduce(series, variable, Statistic::Mean, Some(self.window))
    }

    /// Reduce every variable present in `series` according to `plan`.
    pub fn aggregate(&self, series: &SubdailySeries, plan: &AggregationPlan) -> DailySeries {
        let mut result = DailySeries::new(series.name());
        for variable in series.variables() {
            let rule = plan.rule_for(variable);
            let window = rule.window.then_some(self.window);
            let reduced = self.reduce(series, variable, rule.statistic, window);
            for (date, values) in reduced.iter() {
                result.set(*date, variable, values.get(&variable).copied().flatten());
            }
        }
        result
    }

    fn reduce(
        &self,
        series: &SubdailySeries,
        variable: Variable,
        statistic: Statistic,
        window: Option<HourWindow>,
    ) -> DailySeries {
        let mut dates = BTreeSet::new();
        let mut accumulators: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();

        for record in series.records() {
            let date = record.date();
            dates.insert(date);

            if let Some(window) = window {
                if !window.contains(record.timestamp.hour()) {
                    continue;
                }
            }
            accumulators.entry(date).or_default().add(record.get(variable));
        }

        let mut result = DailySeries::new(series.name());
        for date in dates {
            let value = accumulators
                .get(&date)
                .and_then(|acc| acc.finish(statistic));
            result.set(date, variable, value);
        }
        result
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubdailyRecord, Values};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, 20).unwrap()
    }

    fn reading(date: NaiveDate, hour: u32, variable: Variable, value: Option<f64>) -> SubdailyRecord {
        let mut values = Values::new();
        values.insert(variable, value);
        SubdailyRecord::new(date.and_hms_opt(hour, 30, 0).unwrap(), values)
    }

    #[test]
    fn test_window_mean_only_uses_window_hours() {
        let series = SubdailySeries::new(
            "met",
            vec![
                reading(day(), 5, Variable::Temperature, Some(10.0)),
                reading(day(), 12, Variable::Temperature, Some(20.0)),
                reading(day(), 20, Variable::Temperature, Some(30.0)),
            ],
        );

        let aggregator = Aggregator::new().with_hour_window(HourWindow::new(11, 16).unwrap());
        let daily = aggregator.window_mean(&series, Variable::Temperature);
        assert_eq!(daily.get(day(), Variable::Temperature), Some(20.0));

        let full = aggregator.full_day(&series, Variable::Temperature, Statistic::Mean);
        assert_eq!(full.get(day(), Variable::Temperature), Some(20.0));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let series = SubdailySeries::new(
            "met",
            vec![
                reading(day(), 11, Variable::Temperature, Some(10.0)),
                reading(day(), 16, Variable::Temperature, Some(30.0)),
                reading(day(), 17, Variable::Temperature, Some(100.0)),
            ],
        );

        let daily = Aggregator::new().window_mean(&series, Variable::Temperature);
        assert_eq!(daily.get(day(), Variable::Temperature), Some(20.0));
    }

    #[test]
    fn test_no_valid_readings_is_missing_not_zero() {
        let series = SubdailySeries::new(
            "met",
            vec![
                reading(day(), 3, Variable::Precipitation, None),
                reading(day(), 9, Variable::Precipitation, None),
            ],
        );

        let aggregator = Aggregator::new();
        let mean = aggregator.full_day(&series, Variable::Precipitation, Statistic::Mean);
        let sum = aggregator.full_day(&series, Variable::Precipitation, Statistic::Sum);

        assert_eq!(mean.len(), 1);
        assert_eq!(mean.get(day(), Variable::Precipitation), None);
        assert_eq!(sum.get(day(), Variable::Precipitation), None);
    }

    #[test]
    fn test_window_with_no_readings_is_missing() {
        let series = SubdailySeries::new(
            "met",
            vec![reading(day(), 2, Variable::Temperature, Some(5.0))],
        );

        let daily = Aggregator::new().window_mean(&series, Variable::Temperature);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily.get(day(), Variable::Temperature), None);
    }

    #[test]
    fn test_missing_values_excluded_from_count() {
        let series = SubdailySeries::new(
            "met",
            vec![
                reading(day(), 1, Variable::Radiation, Some(100.0)),
                reading(day(), 2, Variable::Radiation, None),
                reading(day(), 3, Variable::Radiation, Some(200.0)),
            ],
        );

        let daily = Aggregator::new().full_day(&series, Variable::Radiation, Statistic::Mean);
        assert_eq!(daily.get(day(), Variable::Radiation), Some(150.0));
    }

    #[test]
    fn test_plan_mixes_window_and_full_day() {
        let mut records = Vec::new();
        for (hour, temp, precip) in [(6, 8.0, 1.0), (12, 18.0, 0.0), (14, 22.0, 2.0), (22, 9.0, 1.0)] {
            let mut values = Values::new();
            values.insert(Variable::Temperature, Some(temp));
            values.insert(Variable::Precipitation, Some(precip));
            records.push(SubdailyRecord::new(day().and_hms_opt(hour, 0, 0).unwrap(), values));
        }
        let series = SubdailySeries::new("met", records);

        let mut overrides = BTreeMap::new();
        overrides.insert(Variable::Precipitation, AggregationRule::full_day(Statistic::Sum));
        let plan = AggregationPlan::default().with_overrides(&overrides);

        let daily = Aggregator::new().aggregate(&series, &plan);
        assert_eq!(daily.get(day(), Variable::Temperature), Some(20.0));
        assert_eq!(daily.get(day(), Variable::Precipitation), Some(4.0));
    }

    #[test]
    fn test_invalid_hour_window() {
        assert!(HourWindow::new(16, 11).is_err());
        assert!(HourWindow::new(0, 24).is_err());
        assert!(HourWindow::new(0, 23).is_ok());
    }
}
