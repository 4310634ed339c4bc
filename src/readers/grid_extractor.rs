use crate::error::{ProcessingError, Result};
use crate::models::{DailySeries, Values, Variable};
use crate::readers::observation_reader::ColumnMapping;
use crate::utils::constants::{
    GRID_DATE_COLUMN, GRID_DATE_FORMAT, GRID_LAT_COLUMN, GRID_LON_COLUMN, RESOLUTION_DAILY,
    KELVIN_OFFSET, SHORTWAVE_TO_PAR,
};
use crate::utils::coordinates::haversine_distance;
use crate::utils::text::{is_missing_marker, read_text_file};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Point-extraction request against a named gridded product.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub site_id: String,
    pub source: String,
    pub variables: Vec<ColumnMapping>,
    pub directory: PathBuf,
    pub resolution: String,
    pub longitude: f64,
    pub latitude: f64,
    pub start_year: i32,
    pub end_year: i32,
}

/// Maps a site and date range onto a daily series from a gridded product.
pub trait GridExtractor {
    fn extract(&self, request: &GridRequest) -> Result<DailySeries>;
}

/// Unit conversions that can be named in a run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPreset {
    ShortwaveToPar,
    KelvinToCelsius,
}

impl TransformPreset {
    pub fn transform(&self) -> LinearTransform {
        match self {
            TransformPreset::ShortwaveToPar => LinearTransform::shortwave_to_par(),
            TransformPreset::KelvinToCelsius => LinearTransform {
                scale: 1.0,
                offset: -KELVIN_OFFSET,
            },
        }
    }
}

/// `value * scale + offset`, for unit conversion of a source variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTransform {
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for LinearTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl LinearTransform {
    /// Shortwave radiation (W/m²) to photosynthetically active radiation.
    pub fn shortwave_to_par() -> Self {
        Self {
            scale: SHORTWAVE_TO_PAR,
            offset: 0.0,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

pub fn apply_transforms(series: &mut DailySeries, transforms: &BTreeMap<Variable, LinearTransform>) {
    for (variable, transform) in transforms {
        series.map_variable(*variable, |v| transform.apply(v));
    }
}

/// Reads `<directory>/<source>.csv` point tables.
///
/// With `lon`/`lat` columns the file may hold several cells and the one
/// nearest to the site is used; without them the file is a single point.
pub struct CsvGridExtractor;

struct GridRow {
    cell: Option<(f64, f64)>,
    date: NaiveDate,
    values: Values,
}

impl CsvGridExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read_rows(&self, request: &GridRequest) -> Result<Vec<GridRow>> {
        let path = request.directory.join(format!("{}.csv", request.source));
        let text = read_text_file(&path)?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        let position = |column: &str| headers.iter().position(|h| h == column);

        let date_col = position(GRID_DATE_COLUMN).ok_or_else(|| ProcessingError::MissingColumn {
            file: path.clone(),
            column: GRID_DATE_COLUMN.to_string(),
        })?;
        let cell_cols = position(GRID_LON_COLUMN).zip(position(GRID_LAT_COLUMN));

        let mut value_cols = Vec::new();
        for mapping in &request.variables {
            let col = position(mapping.column.as_str()).ok_or_else(|| {
                ProcessingError::MissingColumn {
                    file: path.clone(),
                    column: mapping.column.clone(),
                }
            })?;
            value_cols.push((col, mapping.variable));
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let line = index + 2;
            let field = |i: usize| record.get(i).unwrap_or("");

            let raw_date = field(date_col);
            let date = NaiveDate::parse_from_str(raw_date, GRID_DATE_FORMAT).map_err(|e| {
                ProcessingError::InvalidTimestamp {
                    line,
                    value: raw_date.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !(request.start_year..=request.end_year).contains(&date.year()) {
                continue;
            }

            let cell = match cell_cols {
                Some((lon, lat)) => {
                    let parse = |s: &str| {
                        s.parse::<f64>().map_err(|_| {
                            ProcessingError::InvalidCoordinate(format!(
                                "Invalid grid coordinate '{}' on line {} of {}",
                                s,
                                line,
                                path.display()
                            ))
                        })
                    };
                    Some((parse(field(lon))?, parse(field(lat))?))
                }
                None => None,
            };

            let mut values = Values::new();
            for (col, variable) in &value_cols {
                let raw = field(*col).trim();
                let value = if is_missing_marker(raw, &[]) {
                    None
                } else {
                    let value = raw.parse::<f64>().map_err(|_| {
                        ProcessingError::InvalidFormat(format!(
                            "Invalid value '{}' in column '{}' on line {} of {}",
                            raw,
                            headers.get(*col).unwrap_or_default(),
                            line,
                            path.display()
                        ))
                    })?;
                    value.is_finite().then_some(value)
                };
                values.insert(*variable, value);
            }

            rows.push(GridRow { cell, date, values });
        }

        Ok(rows)
    }

    fn nearest_cell(rows: &[GridRow], request: &GridRequest) -> Option<(f64, f64)> {
        rows.iter()
            .filter_map(|r| r.cell)
            .map(|(lon, lat)| {
                let distance = haversine_distance(request.latitude, request.longitude, lat, lon);
                ((lon, lat), distance)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(cell, _)| cell)
    }
}

impl GridExtractor for CsvGridExtractor {
    fn extract(&self, request: &GridRequest) -> Result<DailySeries> {
        if !request.resolution.eq_ignore_ascii_case(RESOLUTION_DAILY) {
            return Err(ProcessingError::UnsupportedResolution(
                request.resolution.clone(),
            ));
        }

        let rows = self.read_rows(request)?;
        let gridded = rows.iter().any(|r| r.cell.is_some());

        let selected: Vec<GridRow> = if gridded {
            let (lon, lat) =
                Self::nearest_cell(&rows, request).ok_or_else(|| ProcessingError::NoGridCell {
                    source_name: request.source.clone(),
                    site_id: request.site_id.clone(),
                })?;
            debug!(
                "Nearest {} cell to {} is ({}, {})",
                request.source, request.site_id, lon, lat
            );
            rows.into_iter()
                .filter(|r| r.cell == Some((lon, lat)))
                .collect()
        } else {
            rows
        };

        let series = DailySeries::from_records(
            request.source.clone(),
            selected.into_iter().map(|r| (r.date, r.values)),
        )?;

        info!(
            "Extracted {} daily records for {} from {}",
            series.len(),
            request.site_id,
            request.source
        );
        Ok(series)
    }
}

impl Default for CsvGridExtractor {
    fn default() -> Self {
        Self::new()
    }
}
