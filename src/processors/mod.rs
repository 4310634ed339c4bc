pub mod aggregator;
pub mod climatology;
pub mod coverage_checker;
pub mod data_merger;
pub mod pipeline;
pub mod vpd;

pub use aggregator::{AggregationPlan, AggregationRule, Aggregator, HourWindow, Statistic};
pub use climatology::ClimatologyProfile;
pub use coverage_checker::{
    CoverageChecker, CoverageReport, VariableCoverage, Violation, ViolationType,
};
pub use data_merger::{resolve, ForcingMerger, MergedSeries, SourceSeries, SourceTier};
pub use pipeline::ForcingPipeline;
pub use vpd::{HumidityKind, VpdCalculator};
