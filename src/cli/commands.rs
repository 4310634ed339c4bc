use crate::analyzers::ForcingAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::config::{OutputFormat, Overrides, RunConfig};
use crate::error::{ProcessingError, Result};
use crate::models::Variable;
use crate::processors::{CoverageChecker, ForcingPipeline};
use crate::utils::progress::ProgressReporter;
use crate::writers::{write_forcing, ParquetWriter};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, Level};

/// Install the fmt subscriber. Logs go to stderr unless `--log-file` is given.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| ProcessingError::Config(format!("Cannot initialise logging: {}", e)))
}

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Assemble {
            config,
            output,
            format,
            start_year,
            end_year,
            report_json,
        } => {
            let mut run_config = RunConfig::from_file(&config)?;
            run_config.apply_overrides(&Overrides {
                output,
                format: format.as_deref().map(str::parse::<OutputFormat>).transpose()?,
                start_year,
                end_year,
            })?;
            let output_path = run_config.output_path();

            println!("Assembling forcing for site {}...", run_config.site.id);
            println!("Configuration: {}", config.display());
            println!("Output file: {}", output_path.display());

            let progress = ProgressReporter::new_spinner("Assembling forcing...", cli.quiet);
            let pipeline = ForcingPipeline::new(run_config);
            let (records, report) = pipeline.run(Some(&progress))?;

            let checker = CoverageChecker::new();
            println!("\n{}", checker.generate_summary(&report));

            if let Some(path) = &report_json {
                report.write_json(path)?;
                println!("Coverage report written to {}", path.display());
            }

            if records.is_empty() {
                println!("No records to write");
                return Ok(());
            }

            println!("Writing {} records...", records.len());
            let output_config = &pipeline.config().output;
            write_forcing(&records, &output_path, output_config)?;

            if output_config.format == OutputFormat::Parquet {
                let file_info = ParquetWriter::new().get_file_info(&output_path)?;
                println!("\n{}", file_info.summary());
            }

            info!("Assembly complete: {}", output_path.display());
            println!("Assembly complete!");
        }

        Commands::Validate { config } => {
            let run_config = RunConfig::from_file(&config)?;
            println!("Validating forcing inputs for site {}...", run_config.site.id);

            let progress = ProgressReporter::new_spinner("Validating inputs...", cli.quiet);
            let (_records, report) = ForcingPipeline::new(run_config).run(Some(&progress))?;

            let checker = CoverageChecker::new();
            println!("\n{}", checker.generate_summary(&report));

            if report.violations.is_empty() && !report.has_terminal_gaps() {
                println!("✅ All forcing variables fully covered, no QA violations");
            } else {
                println!(
                    "⚠️  Found {} QA violations{}",
                    report.violations.len(),
                    if report.has_terminal_gaps() {
                        " and unfillable gaps"
                    } else {
                        ""
                    }
                );
            }
        }

        Commands::Info { file, sample } => {
            println!("Analyzing forcing file: {}", file.display());

            let analyzer = ForcingAnalyzer::new();
            let stats = analyzer.analyze_file(&file)?;
            println!("\n{}", stats.detailed_summary());

            if OutputFormat::from_path(&file) == OutputFormat::Parquet {
                let file_info = ParquetWriter::new().get_file_info(&file)?;
                println!("\nFile Details:");
                println!("{}", file_info.summary());
            }

            if sample > 0 {
                println!("\nSample Records (showing {} records):", sample);
                match analyzer.read_records(&file, Some(sample)) {
                    Ok(records) => {
                        for (i, record) in records.iter().enumerate() {
                            let values: Vec<String> = Variable::FORCING
                                .iter()
                                .map(|v| match record.get(*v) {
                                    Some(value) => format!("{}={:.2}", v.column_name(), value),
                                    None => format!("{}=NA", v.column_name()),
                                })
                                .collect();
                            println!(
                                "{}. {} (doy {}): {} [{}]",
                                i + 1,
                                record.date,
                                record.doy,
                                values.join(", "),
                                record.fill_flags
                            );
                        }
                    }
                    Err(e) => println!("Error reading sample data: {}", e),
                }
            }
        }
    }

    Ok(())
}
