pub mod ancestry;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod platform;
pub mod resolve;
pub mod types;

pub use cli::Cli;
pub use commands::explain::{explain, ExplainOptions, Outcome};

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::CommandFactory;

use crate::config::Config;

pub fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "witr", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(cli.config.as_deref())?;
    commands::explain::execute(&cli, &config)
}
