use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "site-forcing")]
#[command(about = "Assemble gap-filled daily climate forcing for a single site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Suppress progress output")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the forcing table described by a run configuration
    Assemble {
        #[arg(short, long, help = "Run configuration file (TOML, YAML or JSON)")]
        config: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/forcing-{site}-{start}-{end}.{ext}]"
        )]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Output format: csv or parquet")]
        format: Option<String>,

        #[arg(long, help = "First output year")]
        start_year: Option<i32>,

        #[arg(long, help = "Last output year")]
        end_year: Option<i32>,

        #[arg(long, help = "Write the coverage report as JSON to this path")]
        report_json: Option<PathBuf>,
    },

    /// Run the assembly and report coverage without writing output
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Display statistics for a written forcing file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}
