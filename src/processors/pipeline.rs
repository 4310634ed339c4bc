use crate::config::RunConfig;
use crate::error::Result;
use crate::models::{DailySeries, ForcingRecord, SubdailySeries, Variable};
use crate::processors::aggregator::{AggregationPlan, Aggregator};
use crate::processors::coverage_checker::{CoverageChecker, CoverageReport};
use crate::processors::data_merger::{ForcingMerger, SourceSeries};
use crate::processors::vpd::VpdCalculator;
use crate::readers::grid_extractor::{apply_transforms, CsvGridExtractor, GridExtractor};
use crate::readers::{Co2Reader, ObservationReader};
use crate::utils::progress::ProgressReporter;
use tracing::{debug, info, warn};

/// Runs a whole assembly for one site: extraction, observation loading,
/// VPD derivation, aggregation, merging and coverage checking.
pub struct ForcingPipeline {
    config: RunConfig,
    extractor: Box<dyn GridExtractor>,
    checker: CoverageChecker,
}

impl ForcingPipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            extractor: Box::new(CsvGridExtractor::new()),
            checker: CoverageChecker::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn GridExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_checker(mut self, checker: CoverageChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(
        &self,
        progress: Option<&ProgressReporter>,
    ) -> Result<(Vec<ForcingRecord>, CoverageReport)> {
        let working = self.config.working_years();
        info!(
            "Assembling forcing for site {} (output {}, working span {})",
            self.config.site.id, self.config.years, working
        );

        if let Some(p) = progress {
            p.set_message("Extracting gridded sources...");
        }
        let gridded = self.extract_gridded()?;

        if let Some(p) = progress {
            p.set_message("Loading site observations...");
        }
        let observed = self.load_observations()?;

        let co2 = match &self.config.co2 {
            Some(co2) => {
                if let Some(p) = progress {
                    p.set_message("Reading CO2 record...");
                }
                Some(Co2Reader::new().read_daily(&co2.path, &working.range())?)
            }
            None => None,
        };

        if let Some(p) = progress {
            p.set_message("Merging sources...");
        }
        let mut sources = Vec::new();
        if let Some(observed) = &observed {
            sources.push(SourceSeries::observed(observed));
        }
        sources.extend(gridded.iter().map(SourceSeries::gridded));
        if let Some(co2) = &co2 {
            sources.push(SourceSeries::gridded(co2));
        }

        let merged = ForcingMerger::new()
            .with_variables(&Variable::FORCING)
            .with_year_range(self.config.years.range())
            .merge_sources(&sources);

        for variable in Variable::FORCING {
            let gaps = merged.terminal_gaps(variable);
            if !gaps.is_empty() {
                warn!(
                    "{} has {} days no source or climatology could fill",
                    variable.display_name(),
                    gaps.len()
                );
            }
        }

        if let Some(p) = progress {
            p.set_message("Checking coverage...");
        }
        let records = merged.to_forcing_records();
        let report = self.checker.check(&records);

        if let Some(p) = progress {
            p.finish_with_message(&format!("Assembled {} daily records", records.len()));
        }

        Ok((records, report))
    }

    fn vpd_calculator(&self) -> VpdCalculator {
        VpdCalculator::new(self.config.humidity, self.config.site.elevation)
    }

    /// Every configured gridded source, in precedence order, unit-converted
    /// and with VPD derived wherever humidity is available.
    pub fn extract_gridded(&self) -> Result<Vec<DailySeries>> {
        let working = self.config.working_years();
        let calculator = self.vpd_calculator();
        let humidity = self.config.humidity.variable();

        let mut extracted = Vec::with_capacity(self.config.gridded.len());
        for source in &self.config.gridded {
            let request = source.request(&self.config.site, &working);
            let mut series = self.extractor.extract(&request)?;
            apply_transforms(&mut series, &source.transform_map());

            if series.variables().contains(&humidity) {
                series = calculator.daily_vpd(&series);
            }

            debug!(
                "Source {} provides {:?} over {:?}",
                source.name,
                series.variables(),
                series.date_range()
            );
            extracted.push(series);
        }
        Ok(extracted)
    }

    /// The observed tier: daily observations first, then the daily
    /// aggregate of the sub-daily logger. `None` when neither is configured.
    pub fn load_observations(&self) -> Result<Option<DailySeries>> {
        let working = self.config.working_years().range();
        let reader = ObservationReader::new();
        let calculator = self.vpd_calculator();
        let humidity = self.config.humidity.variable();

        let daily = match &self.config.observations.daily {
            Some(file) => {
                let series = reader.read_daily(file)?.restrict_years(&working);
                Some(if series.variables().contains(&humidity) {
                    calculator.daily_vpd(&series)
                } else {
                    series
                })
            }
            None => None,
        };

        let aggregated = match &self.config.observations.subdaily {
            Some(file) => {
                let series = reader.read_subdaily(file)?;
                Some(self.aggregate_subdaily(&series, daily.as_ref(), &calculator))
            }
            None => None,
        };

        let observed = match (daily, aggregated) {
            (Some(daily), Some(aggregated)) => Some(daily.overlay(&aggregated)),
            (Some(daily), None) => Some(daily),
            (None, Some(aggregated)) => Some(aggregated),
            (None, None) => None,
        };

        Ok(observed.map(|o| o.restrict_years(&working)))
    }

    fn aggregate_subdaily(
        &self,
        series: &SubdailySeries,
        daily: Option<&DailySeries>,
        calculator: &VpdCalculator,
    ) -> DailySeries {
        let humidity = self.config.humidity.variable();
        let has_temperature = series.variables().contains(&Variable::Temperature);
        let daily_humidity = daily.filter(|d| d.variables().contains(&humidity));

        let with_vpd = if has_temperature
            && (daily_humidity.is_some() || series.variables().contains(&humidity))
        {
            calculator.subdaily_vpd(series, daily_humidity)
        } else {
            debug!("No humidity alongside sub-daily temperature; VPD left to other sources");
            series.clone()
        };

        let plan = AggregationPlan::default().with_overrides(&self.config.aggregation_overrides());
        let aggregated = Aggregator::new()
            .with_hour_window(self.config.hour_window)
            .aggregate(&with_vpd, &plan);

        info!(
            "Aggregated {} sub-daily readings into {} days (window {}..={})",
            series.len(),
            aggregated.len(),
            self.config.hour_window.start,
            self.config.hour_window.end
        );
        aggregated
    }
}
