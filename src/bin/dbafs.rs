//! dbafs CLI Binary
//!
//! Command-line interface for synchronizing a record database with a filesystem.

use anyhow::Context;
use clap::Parser;
use dbafs::logging::init_logging;
use dbafs::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error initializing workspace")?;

    let logging = cli.logging_config(context.config().logging.clone());
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
