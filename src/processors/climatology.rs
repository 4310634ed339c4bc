use crate::models::{DailySeries, Variable};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Mean value per day-of-year (1..=366) and variable.
///
/// Derived from a working dataset and rebuilt whenever that dataset changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimatologyProfile {
    means: BTreeMap<u32, BTreeMap<Variable, f64>>,
}

impl ClimatologyProfile {
    /// Reduce by day-of-year with running (sum, count) accumulators; missing
    /// values count towards neither.
    pub fn from_series(series: &DailySeries) -> Self {
        let mut accumulators: BTreeMap<(u32, Variable), (f64, usize)> = BTreeMap::new();

        for (date, values) in series.iter() {
            let doy = date.ordinal();
            for (variable, value) in values {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    let acc = accumulators.entry((doy, *variable)).or_insert((0.0, 0));
                    acc.0 += v;
                    acc.1 += 1;
                }
            }
        }

        let mut means: BTreeMap<u32, BTreeMap<Variable, f64>> = BTreeMap::new();
        for ((doy, variable), (sum, count)) in accumulators {
            means
                .entry(doy)
                .or_default()
                .insert(variable, sum / count as f64);
        }

        Self { means }
    }

    pub fn value(&self, doy: u32, variable: Variable) -> Option<f64> {
        self.means.get(&doy).and_then(|m| m.get(&variable)).copied()
    }

    /// Number of days-of-year with a mean for `variable`.
    pub fn coverage(&self, variable: Variable) -> usize {
        self.means
            .values()
            .filter(|m| m.contains_key(&variable))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}
