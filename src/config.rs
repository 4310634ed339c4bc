use crate::error::{ProcessingError, Result};
use crate::models::{Site, Variable};
use crate::processors::aggregator::{AggregationRule, HourWindow, Statistic};
use crate::processors::vpd::HumidityKind;
use crate::readers::grid_extractor::{GridRequest, LinearTransform, TransformPreset};
use crate::readers::observation_reader::{ColumnMapping, ObservationFile};
use crate::utils::constants::{
    COMPRESSION_SNAPPY, DEFAULT_OUTPUT_MISSING, ENV_PREFIX, RESOLUTION_DAILY,
};
use crate::utils::filename::generate_default_output_filename;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::Validate;

/// Everything needed to assemble one site's forcing series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RunConfig {
    #[validate(nested)]
    pub site: Site,

    /// Years written to the output
    pub years: YearRange,

    /// Wider span used for extraction and the day-of-year climatology
    #[serde(default)]
    pub extraction_years: Option<YearRange>,

    #[serde(default)]
    pub hour_window: HourWindow,

    #[serde(default)]
    pub humidity: HumidityKind,

    /// Per-variable overrides of the default aggregation plan
    #[serde(default)]
    pub aggregation: Vec<AggregationOverride>,

    /// Gridded products in precedence order
    #[serde(default)]
    pub gridded: Vec<GriddedSourceConfig>,

    #[serde(default)]
    pub observations: ObservationsConfig,

    #[serde(default)]
    pub co2: Option<Co2Config>,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &YearRange) -> YearRange {
        YearRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedSourceConfig {
    pub name: String,
    pub directory: PathBuf,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    pub variables: Vec<ColumnMapping>,
    #[serde(default)]
    pub transforms: Vec<VariableTransform>,
}

// Lists rather than maps keyed by variable: the config loader lowercases keys
// and cannot read enum map keys.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOverride {
    pub variable: Variable,
    #[serde(default)]
    pub statistic: Statistic,
    #[serde(default)]
    pub window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableTransform {
    pub variable: Variable,
    /// Named conversion; takes the place of `scale` and `offset` when set
    #[serde(default)]
    pub preset: Option<TransformPreset>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

fn default_resolution() -> String {
    RESOLUTION_DAILY.to_string()
}

impl GriddedSourceConfig {
    pub fn transform_map(&self) -> BTreeMap<Variable, LinearTransform> {
        self.transforms
            .iter()
            .map(|t| {
                let transform = match t.preset {
                    Some(preset) => preset.transform(),
                    None => LinearTransform {
                        scale: t.scale,
                        offset: t.offset,
                    },
                };
                (t.variable, transform)
            })
            .collect()
    }

    pub fn request(&self, site: &Site, years: &YearRange) -> GridRequest {
        GridRequest {
            site_id: site.id.clone(),
            source: self.name.clone(),
            variables: self.variables.clone(),
            directory: self.directory.clone(),
            resolution: self.resolution.clone(),
            longitude: site.longitude,
            latitude: site.latitude,
            start_year: years.start,
            end_year: years.end,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationsConfig {
    #[serde(default)]
    pub daily: Option<ObservationFile>,
    #[serde(default)]
    pub subdaily: Option<ObservationFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2Config {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }

    /// Guess from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => OutputFormat::Parquet,
            _ => OutputFormat::Csv,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(ProcessingError::Config(format!(
                "Unknown output format '{}' (expected csv or parquet)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_missing_marker")]
    pub missing_marker: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default)]
    pub fill_flags: bool,
}

fn default_missing_marker() -> String {
    DEFAULT_OUTPUT_MISSING.to_string()
}

fn default_compression() -> String {
    COMPRESSION_SNAPPY.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: OutputFormat::default(),
            missing_marker: default_missing_marker(),
            compression: default_compression(),
            fill_flags: false,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl RunConfig {
    /// Load a config file (format detected from its extension), then apply
    /// `SITE_FORCING__SECTION__KEY` environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: RunConfig = settings.try_deserialize()?;
        config.validate_config()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;
        let config: RunConfig = settings.try_deserialize()?;
        config.validate_config()?;
        Ok(config)
    }

    pub fn validate_config(&self) -> Result<()> {
        self.validate()?;

        check_years("years", &self.years)?;
        if let Some(extraction) = &self.extraction_years {
            check_years("extraction_years", extraction)?;
        }
        self.hour_window.check()?;

        for source in &self.gridded {
            if source.variables.is_empty() {
                return Err(ProcessingError::Config(format!(
                    "Gridded source '{}' maps no variables",
                    source.name
                )));
            }
        }
        for file in [&self.observations.daily, &self.observations.subdaily]
            .into_iter()
            .flatten()
        {
            if file.columns.is_empty() {
                return Err(ProcessingError::Config(format!(
                    "Observation file {} maps no columns",
                    file.path.display()
                )));
            }
        }

        // Checked here so a bad value fails before any work is done
        crate::writers::parquet_writer::parse_compression(&self.output.compression)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(path) = &overrides.output {
            self.output.path = Some(path.clone());
            if overrides.format.is_none() {
                self.output.format = OutputFormat::from_path(path);
            }
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
        if let Some(start) = overrides.start_year {
            self.years.start = start;
        }
        if let Some(end) = overrides.end_year {
            self.years.end = end;
        }
        self.validate_config()
    }

    pub fn aggregation_overrides(&self) -> BTreeMap<Variable, AggregationRule> {
        self.aggregation
            .iter()
            .map(|o| {
                (
                    o.variable,
                    AggregationRule {
                        statistic: o.statistic,
                        window: o.window,
                    },
                )
            })
            .collect()
    }

    /// Span read from every source: the output years widened by
    /// `extraction_years`.
    pub fn working_years(&self) -> YearRange {
        match &self.extraction_years {
            Some(extraction) => self.years.union(extraction),
            None => self.years,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output.path {
            Some(path) => path.clone(),
            None => generate_default_output_filename(
                &self.site.id,
                self.years.start,
                self.years.end,
                self.output.format.extension(),
            ),
        }
    }
}

fn check_years(name: &str, years: &YearRange) -> Result<()> {
    if years.start > years.end {
        return Err(ProcessingError::Config(format!(
            "{} range is reversed: {} > {}",
            name, years.start, years.end
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"
[site]
id = "US-Ha1"
longitude = -72.1715
latitude = "42:32:16N"
elevation = 340.0

[years]
start = 2010
end = 2012

[extraction_years]
start = 2005
end = 2011

[hour_window]
start = 10
end = 15

[[aggregation]]
variable = "precipitation"
statistic = "sum"

[[gridded]]
name = "cru"
directory = "grids"
variables = [
  { column = "tmp", variable = "temperature" },
  { column = "pre", variable = "precipitation" },
]
transforms = [
  { variable = "temperature", offset = -273.15 },
  { variable = "radiation", preset = "shortwave_to_par" },
]

[observations.daily]
path = "obs/daily.csv"
columns = [{ column = "Tair", variable = "temperature" }]

[observations.daily.timestamp]
layout = "combined"
column = "TIMESTAMP"
format = "%Y-%m-%d"

[co2]
path = "co2_annmean_gl.txt"

[output]
format = "parquet"
fill_flags = true
"#;

    #[test]
    fn test_parse_full_config() -> Result<()> {
        let config = RunConfig::from_toml_str(SAMPLE)?;

        assert_eq!(config.site.id, "US-Ha1");
        assert!((config.site.latitude - 42.537778).abs() < 1e-6);
        assert_eq!(config.years, YearRange::new(2010, 2012));
        assert_eq!(config.working_years(), YearRange::new(2005, 2012));
        assert_eq!(config.hour_window, HourWindow { start: 10, end: 15 });
        assert_eq!(
            config.aggregation_overrides().get(&Variable::Precipitation),
            Some(&AggregationRule::full_day(Statistic::Sum))
        );
        assert_eq!(config.gridded.len(), 1);
        assert_eq!(config.gridded[0].resolution, "daily");
        assert_eq!(
            config.gridded[0].transform_map().get(&Variable::Temperature),
            Some(&LinearTransform {
                scale: 1.0,
                offset: -273.15
            })
        );
        assert_eq!(
            config.gridded[0].transform_map().get(&Variable::Radiation),
            Some(&LinearTransform::shortwave_to_par())
        );
        assert!(config.observations.subdaily.is_none());
        assert_eq!(config.output.format, OutputFormat::Parquet);
        assert_eq!(config.output.missing_marker, "NA");
        assert!(config.output.fill_flags);
        Ok(())
    }

    #[test]
    fn test_minimal_config_defaults() -> Result<()> {
        let config = RunConfig::from_toml_str(
            "[site]\nid = \"X\"\nlongitude = 0.0\nlatitude = 0.0\n[years]\nstart = 2000\nend = 2000\n",
        )?;

        assert_eq!(config.hour_window, HourWindow::default());
        assert_eq!(config.humidity, HumidityKind::Relative);
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(
            config.output_path(),
            PathBuf::from("output/forcing-X-2000-2000.csv")
        );
        Ok(())
    }

    #[test]
    fn test_rejects_reversed_years() {
        let result = RunConfig::from_toml_str(
            "[site]\nid = \"X\"\nlongitude = 0.0\nlatitude = 0.0\n[years]\nstart = 2005\nend = 2000\n",
        );
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_site() {
        let result = RunConfig::from_toml_str(
            "[site]\nid = \"\"\nlongitude = 0.0\nlatitude = 95.0\n[years]\nstart = 2000\nend = 2000\n",
        );
        assert!(matches!(result, Err(ProcessingError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_hour_window() {
        let result = RunConfig::from_toml_str(
            "[site]\nid = \"X\"\nlongitude = 0.0\nlatitude = 0.0\n[years]\nstart = 2000\nend = 2000\n[hour_window]\nstart = 18\nend = 25\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let mut config = RunConfig::from_toml_str(SAMPLE)?;
        config.apply_overrides(&Overrides {
            output: Some(PathBuf::from("out/site.csv")),
            start_year: Some(2011),
            ..Default::default()
        })?;

        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.years, YearRange::new(2011, 2012));
        assert_eq!(config.output_path(), PathBuf::from("out/site.csv"));

        let reversed = config.apply_overrides(&Overrides {
            end_year: Some(2000),
            ..Default::default()
        });
        assert!(reversed.is_err());
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        write!(file, "{}", SAMPLE)?;

        let config = RunConfig::from_file(file.path())?;
        assert_eq!(config.gridded[0].name, "cru");
        Ok(())
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("Parquet".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert!("xlsx".parse::<OutputFormat>().is_err());
        assert_eq!(
            OutputFormat::from_path(Path::new("a/b.parquet")),
            OutputFormat::Parquet
        );
    }
}
