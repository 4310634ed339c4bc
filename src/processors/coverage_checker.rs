use crate::error::Result;
use crate::models::{ForcingRecord, Provenance, Variable};
use crate::utils::constants::TEMPERATURE_JUMP_THRESHOLD;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    pub total_records: usize,
    pub complete_records: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub variables: BTreeMap<Variable, VariableCoverage>,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableCoverage {
    pub observed: usize,
    pub gridded: usize,
    pub climatology: usize,
    pub missing: usize,
    pub terminal_gaps: Vec<NaiveDate>,
}

impl VariableCoverage {
    pub fn total(&self) -> usize {
        self.observed + self.gridded + self.climatology + self.missing
    }

    pub fn available_percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        100.0 * (total - self.missing) as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub date: NaiveDate,
    pub variable: Variable,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationType {
    OutOfRange,
    SuspiciousJump,
}

impl CoverageReport {
    pub fn coverage(&self, variable: Variable) -> Option<&VariableCoverage> {
        self.variables.get(&variable)
    }

    pub fn has_terminal_gaps(&self) -> bool {
        self.variables.values().any(|c| c.missing > 0)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Replaces eyeballing plots: provenance counts, gaps and implausible values.
pub struct CoverageChecker {
    temperature_jump_threshold: f64,
}

impl CoverageChecker {
    pub fn new() -> Self {
        Self {
            temperature_jump_threshold: TEMPERATURE_JUMP_THRESHOLD,
        }
    }

    pub fn with_jump_threshold(mut self, threshold: f64) -> Self {
        self.temperature_jump_threshold = threshold;
        self
    }

    pub fn check(&self, records: &[ForcingRecord]) -> CoverageReport {
        let mut report = CoverageReport {
            total_records: records.len(),
            date_range: records
                .first()
                .zip(records.last())
                .map(|(first, last)| (first.date, last.date)),
            ..Default::default()
        };

        for record in records {
            if record.is_complete() {
                report.complete_records += 1;
            }

            for variable in Variable::FORCING {
                let coverage = report.variables.entry(variable).or_default();
                match record.provenance(variable) {
                    Provenance::Observed => coverage.observed += 1,
                    Provenance::Gridded => coverage.gridded += 1,
                    Provenance::Climatology => coverage.climatology += 1,
                    Provenance::Missing => {
                        coverage.missing += 1;
                        coverage.terminal_gaps.push(record.date);
                    }
                }

                self.check_range(record, variable, &mut report);
            }
        }

        self.check_temperature_jumps(records, &mut report);
        report
    }

    fn check_range(&self, record: &ForcingRecord, variable: Variable, report: &mut CoverageReport) {
        let Some(value) = record.get(variable) else {
            return;
        };
        let (min, max) = variable.plausible_range();
        if !(min..=max).contains(&value) {
            report.violations.push(Violation {
                date: record.date,
                variable,
                violation_type: ViolationType::OutOfRange,
                details: format!(
                    "{} {} {} is outside plausible range [{}, {}]",
                    variable.display_name(),
                    value,
                    variable.units(),
                    min,
                    max
                ),
            });
        }
    }

    fn check_temperature_jumps(&self, records: &[ForcingRecord], report: &mut CoverageReport) {
        for window in records.windows(2) {
            let (prev, curr) = (&window[0], &window[1]);
            if let (Some(a), Some(b)) = (prev.temperature, curr.temperature) {
                let jump = (b - a).abs();
                if jump > self.temperature_jump_threshold {
                    report.violations.push(Violation {
                        date: curr.date,
                        variable: Variable::Temperature,
                        violation_type: ViolationType::SuspiciousJump,
                        details: format!(
                            "temperature jumped {:.1}°C from {} to {}",
                            jump, prev.date, curr.date
                        ),
                    });
                }
            }
        }
    }

    pub fn generate_summary(&self, report: &CoverageReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Forcing Coverage Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        if let Some((first, last)) = report.date_range {
            summary.push_str(&format!("Date Range: {} to {}\n", first, last));
        }
        summary.push_str(&format!(
            "Complete Records: {} ({:.1}%)\n",
            report.complete_records,
            percentage(report.complete_records, report.total_records)
        ));

        summary.push_str("\nVariable        Observed  Gridded  Climatology  Missing\n");
        for (variable, coverage) in &report.variables {
            summary.push_str(&format!(
                "{:<14} {:>9} {:>8} {:>12} {:>8}\n",
                variable.column_name(),
                coverage.observed,
                coverage.gridded,
                coverage.climatology,
                coverage.missing
            ));
        }

        for (variable, coverage) in &report.variables {
            if let (Some(first), Some(last)) =
                (coverage.terminal_gaps.first(), coverage.terminal_gaps.last())
            {
                summary.push_str(&format!(
                    "\n{} has {} unfillable days ({} .. {})",
                    variable.column_name(),
                    coverage.terminal_gaps.len(),
                    first,
                    last
                ));
            }
        }

        summary.push_str(&format!("\n\nViolations: {}\n", report.violations.len()));
        if !report.violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {}: {}\n",
                    i + 1,
                    violation.date,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for CoverageChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
