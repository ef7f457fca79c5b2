//! jcictl (jci) - synthesizes the Jenkins deployment
//!
//! Builds the controller and agent stacks and writes them as a cloud
//! assembly for an external deployment tool.

use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod error;
mod logging;
mod output;

use commands::Cli;
use config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    logging::init(&config);

    if let Err(e) = cli.run(config) {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
