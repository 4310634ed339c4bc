use chrono::{Datelike, NaiveDate};
use pretty_assertions::assert_eq;
use site_forcing::analyzers::ForcingAnalyzer;
use site_forcing::config::{OutputFormat, Overrides, RunConfig};
use site_forcing::models::{calendar_dates, Provenance, Variable};
use site_forcing::processors::ForcingPipeline;
use site_forcing::writers::{write_forcing, CsvWriter, ParquetWriter};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

/// Two grid cells over 2018-2020; the one at 42.75N is nearest the site.
/// Precipitation is missing on day-of-year 70 in every year, so the
/// climatology has nothing to fill it with.
fn write_gridded(dir: &Path) {
    let mut text = String::from("lon,lat,date,tmp,pre,swr\n");
    for date in calendar_dates(&(2018..=2020)) {
        let temperature = 10.0 + (date.ordinal() as f64 / 366.0) * 10.0;
        let pre = if date.ordinal() == 70 {
            "NA".to_string()
        } else {
            "1.5".to_string()
        };
        writeln!(text, "-72.25,42.75,{},{:.2},{},200", date, temperature, pre).unwrap();
        writeln!(text, "-72.25,42.25,{},{:.2},9.0,100", date, temperature + 50.0).unwrap();
    }
    std::fs::create_dir_all(dir.join("grids")).unwrap();
    std::fs::write(dir.join("grids").join("cru.csv"), text).unwrap();
}

fn write_observations(dir: &Path) {
    // Half-hourly logger export for two days with a gap in humidity on the second
    let mut text = String::from("TIMESTAMP;Tair;RH\n");
    for hour in 0..24 {
        let temperature = if (11..=16).contains(&hour) { 25.0 } else { 15.0 };
        writeln!(text, "2020-07-01 {:02}:00:00;{};50", hour, temperature).unwrap();
        writeln!(text, "2020-07-02 {:02}:00:00;{};NA", hour, temperature).unwrap();
    }
    std::fs::write(dir.join("logger.csv"), text).unwrap();

    // Daily gauge with a precipitation record
    std::fs::write(
        dir.join("gauge.csv"),
        "year,month,day,P\n2020,7,1,12.5\n2020,7,2,-9999\n",
    )
    .unwrap();
}

fn write_co2(dir: &Path) {
    std::fs::write(
        dir.join("co2_annmean_gl.txt"),
        "# Global annual means\n# year mean unc\n2018 407.61 0.10\n2019 410.07 0.10\n2020 412.44 0.10\n",
    )
    .unwrap();
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = format!(
        r#"
[site]
id = "US-Ha1"
longitude = "72:10:17W"
latitude = 42.5378
elevation = 340.0

[years]
start = 2020
end = 2020

[extraction_years]
start = 2018
end = 2020

[[gridded]]
name = "cru"
directory = "{grids}"
variables = [
  {{ column = "tmp", variable = "temperature" }},
  {{ column = "pre", variable = "precipitation" }},
  {{ column = "swr", variable = "radiation" }},
]
transforms = [{{ variable = "radiation", scale = 2.285 }}]

[observations.subdaily]
path = "{logger}"
delimiter = ";"
columns = [
  {{ column = "Tair", variable = "temperature" }},
  {{ column = "RH", variable = "relative_humidity" }},
]

[observations.subdaily.timestamp]
layout = "combined"
column = "TIMESTAMP"

[observations.daily]
path = "{gauge}"
columns = [{{ column = "P", variable = "precipitation" }}]

[co2]
path = "{co2}"

[output]
fill_flags = true
"#,
        grids = dir.join("grids").display(),
        logger = dir.join("logger.csv").display(),
        gauge = dir.join("gauge.csv").display(),
        co2 = dir.join("co2_annmean_gl.txt").display(),
    );
    let path = dir.join("run.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn fixture() -> (TempDir, RunConfig) {
    let dir = TempDir::new().unwrap();
    write_gridded(dir.path());
    write_observations(dir.path());
    write_co2(dir.path());
    let config_path = write_config(dir.path());
    let config = RunConfig::from_file(&config_path).unwrap();
    (dir, config)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_end_to_end_assembly() {
    let (_dir, config) = fixture();
    let (records, report) = ForcingPipeline::new(config).run(None).unwrap();

    // Every calendar day of the output year, nothing from the extraction span
    assert_eq!(records.len(), 366);
    assert_eq!(records.first().unwrap().date, date(2020, 1, 1));
    assert_eq!(records.last().unwrap().date, date(2020, 12, 31));

    let july1 = records.iter().find(|r| r.date == date(2020, 7, 1)).unwrap();
    assert_eq!(july1.temperature, Some(25.0));
    assert_eq!(july1.provenance(Variable::Temperature), Provenance::Observed);
    assert_eq!(july1.precipitation, Some(12.5));
    assert_eq!(july1.provenance(Variable::Precipitation), Provenance::Observed);
    assert_eq!(july1.provenance(Variable::Vpd), Provenance::Observed);
    // es(25) * (1 - 0.5)
    assert!((july1.vpd.unwrap() - 1.5838).abs() < 1e-3);
    assert!((july1.radiation.unwrap() - 457.0).abs() < 1e-9);
    assert_eq!(july1.co2, Some(412.44));

    // Gauge missing on 2 July: gridded precipitation takes over
    let july2 = records.iter().find(|r| r.date == date(2020, 7, 2)).unwrap();
    assert_eq!(july2.precipitation, Some(1.5));
    assert_eq!(july2.provenance(Variable::Precipitation), Provenance::Gridded);
    // No humidity that day, so no VPD anywhere
    assert_eq!(july2.provenance(Variable::Vpd), Provenance::Missing);

    // Nearest cell, not the +50 one
    let jan1 = &records[0];
    assert!(jan1.temperature.unwrap() < 20.0);
    assert_eq!(jan1.provenance(Variable::Temperature), Provenance::Gridded);

    // Day 70 of the leap year; missing in every year of the working span
    let march10 = records.iter().find(|r| r.date == date(2020, 3, 10)).unwrap();
    assert_eq!(march10.provenance(Variable::Precipitation), Provenance::Missing);

    let precipitation = report.coverage(Variable::Precipitation).unwrap();
    assert_eq!(precipitation.observed, 1);
    assert_eq!(precipitation.missing, 1);
    assert_eq!(precipitation.terminal_gaps, vec![date(2020, 3, 10)]);
    assert_eq!(report.coverage(Variable::CloudCover).unwrap().missing, 366);
}

#[test]
fn test_climatology_fills_from_extraction_years() {
    let (dir, mut config) = fixture();

    // Drop 2020 from the gridded file for 1 May: only 2018 and 2019 remain
    let grid_path = dir.path().join("grids").join("cru.csv");
    let text = std::fs::read_to_string(&grid_path).unwrap();
    let filtered: String = text
        .lines()
        .filter(|line| !line.contains("2020-05-01"))
        .map(|line| format!("{}\n", line))
        .collect();
    std::fs::write(&grid_path, filtered).unwrap();

    config.observations.subdaily = None;
    config.observations.daily = None;
    let (records, _) = ForcingPipeline::new(config).run(None).unwrap();

    let may1 = records.iter().find(|r| r.date == date(2020, 5, 1)).unwrap();
    assert_eq!(may1.provenance(Variable::Temperature), Provenance::Climatology);
    assert_eq!(may1.precipitation, Some(1.5));
    assert!(may1.has_climatology_fill());
}

#[test]
fn test_write_and_inspect_outputs() {
    let (dir, mut config) = fixture();
    let (records, report) = ForcingPipeline::new(config.clone()).run(None).unwrap();

    let csv_path = dir.path().join("out").join("forcing.csv");
    config
        .apply_overrides(&Overrides {
            output: Some(csv_path.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(config.output.format, OutputFormat::Csv);
    write_forcing(&records, &config.output_path(), &config.output).unwrap();

    let read_back = CsvWriter::new().read_records(&csv_path).unwrap();
    assert_eq!(read_back, records);

    let parquet_path = dir.path().join("out").join("forcing.parquet");
    config
        .apply_overrides(&Overrides {
            output: Some(parquet_path.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(config.output.format, OutputFormat::Parquet);
    write_forcing(&records, &parquet_path, &config.output).unwrap();

    let info = ParquetWriter::new().get_file_info(&parquet_path).unwrap();
    assert_eq!(info.total_rows, 366);

    let stats = ForcingAnalyzer::new().analyze_file(&parquet_path).unwrap();
    assert_eq!(stats.total_records, 366);
    assert_eq!(stats.variables[&Variable::Co2].count, 366);
    assert_eq!(stats.variables[&Variable::CloudCover].count, 0);

    let report_path = dir.path().join("out").join("coverage.json");
    report.write_json(&report_path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["total_records"], 366);
}

#[test]
fn test_year_override_restricts_output() {
    let (_dir, mut config) = fixture();
    config
        .apply_overrides(&Overrides {
            start_year: Some(2019),
            end_year: Some(2019),
            ..Default::default()
        })
        .unwrap();

    let (records, _) = ForcingPipeline::new(config).run(None).unwrap();
    assert_eq!(records.len(), 365);
    assert!(records.iter().all(|r| r.date.year() == 2019));
    assert!(records.iter().all(|r| r.co2 == Some(410.07)));
}

#[test]
fn test_duplicate_dates_fail_the_run() {
    let (dir, config) = fixture();
    std::fs::write(
        dir.path().join("gauge.csv"),
        "year,month,day,P\n2020,7,1,12.5\n2020,7,1,3.0\n",
    )
    .unwrap();

    let result = ForcingPipeline::new(config).run(None);
    assert!(matches!(
        result,
        Err(site_forcing::ProcessingError::DuplicateDate { .. })
    ));
}
