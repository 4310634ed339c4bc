use crate::models::{calendar_dates, DailySeries, ForcingRecord, Provenance, Variable};
use crate::processors::climatology::ClimatologyProfile;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Precedence tier of an input series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTier {
    Observed,
    Gridded,
}

impl SourceTier {
    pub fn provenance(&self) -> Provenance {
        match self {
            SourceTier::Observed => Provenance::Observed,
            SourceTier::Gridded => Provenance::Gridded,
        }
    }
}

/// An input series with its tier. Sources are consulted in list order.
#[derive(Debug, Clone, Copy)]
pub struct SourceSeries<'a> {
    pub tier: SourceTier,
    pub series: &'a DailySeries,
}

impl<'a> SourceSeries<'a> {
    pub fn observed(series: &'a DailySeries) -> Self {
        Self {
            tier: SourceTier::Observed,
            series,
        }
    }

    pub fn gridded(series: &'a DailySeries) -> Self {
        Self {
            tier: SourceTier::Gridded,
            series,
        }
    }
}

/// First non-missing candidate wins; nothing available resolves to `Missing`.
pub fn resolve<I>(candidates: I) -> (Option<f64>, Provenance)
where
    I: IntoIterator<Item = (Option<f64>, Provenance)>,
{
    candidates
        .into_iter()
        .find_map(|(value, provenance)| value.map(|v| (Some(v), provenance)))
        .unwrap_or((None, Provenance::Missing))
}

/// Merged values plus the provenance of every (date, variable) cell.
#[derive(Debug, Clone, Default)]
pub struct MergedSeries {
    pub series: DailySeries,
    pub provenance: BTreeMap<(NaiveDate, Variable), Provenance>,
    pub variables: Vec<Variable>,
}

impl MergedSeries {
    pub fn provenance_of(&self, date: NaiveDate, variable: Variable) -> Provenance {
        self.provenance
            .get(&(date, variable))
            .copied()
            .unwrap_or(Provenance::Missing)
    }

    pub fn count(&self, variable: Variable, provenance: Provenance) -> usize {
        self.provenance
            .iter()
            .filter(|((_, v), p)| *v == variable && **p == provenance)
            .count()
    }

    /// Dates still missing `variable` after climatology filling.
    pub fn terminal_gaps(&self, variable: Variable) -> Vec<NaiveDate> {
        self.provenance
            .iter()
            .filter(|((_, v), p)| *v == variable && **p == Provenance::Missing)
            .map(|((date, _), _)| *date)
            .collect()
    }

    pub fn to_forcing_records(&self) -> Vec<ForcingRecord> {
        self.series
            .dates()
            .map(|date| {
                let mut record = ForcingRecord::new(date);
                for variable in Variable::FORCING {
                    record.set(
                        variable,
                        self.series.get(date, variable),
                        self.provenance_of(date, variable),
                    );
                }
                record
            })
            .collect()
    }
}

/// Joins observed and gridded series and fills what remains from climatology.
pub struct ForcingMerger {
    variables: Option<Vec<Variable>>,
    years: Option<RangeInclusive<i32>>,
}

impl ForcingMerger {
    pub fn new() -> Self {
        Self {
            variables: None,
            years: None,
        }
    }

    pub fn with_variables(mut self, variables: &[Variable]) -> Self {
        self.variables = Some(variables.to_vec());
        self
    }

    /// Output covers every calendar date of these years, and only them.
    pub fn with_year_range(mut self, years: RangeInclusive<i32>) -> Self {
        self.years = Some(years);
        self
    }

    /// Two-tier form: one observed series, gridded series in precedence order.
    pub fn merge(&self, primary: &DailySeries, secondaries: &[&DailySeries]) -> MergedSeries {
        let mut sources = vec![SourceSeries::observed(primary)];
        sources.extend(secondaries.iter().map(|s| SourceSeries::gridded(s)));
        self.merge_sources(&sources)
    }

    pub fn merge_sources(&self, sources: &[SourceSeries<'_>]) -> MergedSeries {
        let variables: Vec<Variable> = match &self.variables {
            Some(variables) => variables.clone(),
            None => sources
                .iter()
                .flat_map(|s| s.series.variables())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let dates = self.working_dates(sources);

        // Observed, then gridded: first non-missing wins
        let mut working = DailySeries::new("merged");
        let mut provenance = BTreeMap::new();
        for date in &dates {
            for variable in &variables {
                let (value, origin) = resolve(sources.iter().map(|source| {
                    (
                        source.series.get(*date, *variable),
                        source.tier.provenance(),
                    )
                }));
                working.set(*date, *variable, value);
                provenance.insert((*date, *variable), origin);
            }
        }

        // Climatology over the whole working span, not just the output years
        let climatology = ClimatologyProfile::from_series(&working);
        let mut filled = 0usize;
        for date in &dates {
            let doy = date.ordinal();
            for variable in &variables {
                if working.get(*date, *variable).is_some() {
                    continue;
                }
                if let Some(mean) = climatology.value(doy, *variable) {
                    working.set(*date, *variable, Some(mean));
                    provenance.insert((*date, *variable), Provenance::Climatology);
                    filled += 1;
                }
            }
        }
        debug!("Filled {} values from day-of-year climatology", filled);

        let (series, provenance) = match &self.years {
            Some(years) => (
                working.restrict_years(years),
                provenance
                    .into_iter()
                    .filter(|((date, _), _)| years.contains(&date.year()))
                    .collect(),
            ),
            None => (working, provenance),
        };

        info!(
            "Merged {} sources into {} daily records ({} variables)",
            sources.len(),
            series.len(),
            variables.len()
        );

        MergedSeries {
            series,
            provenance,
            variables,
        }
    }

    fn working_dates(&self, sources: &[SourceSeries<'_>]) -> Vec<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = sources
            .iter()
            .flat_map(|s| s.series.dates())
            .collect();

        // Without a range only the input dates exist; no calendar to complete
        if let Some(years) = &self.years {
            dates.extend(calendar_dates(years));
        }

        dates.into_iter().collect()
    }
}

impl Default for ForcingMerger {
    fn default() -> Self {
        Self::new()
    }
}
