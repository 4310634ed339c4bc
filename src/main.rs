use anyhow::Context;
use clap::Parser;
use site_forcing::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).context("site-forcing failed")
}
